//! Transfer Transaction Engine
//!
//! Moves funds between two ledger accounts as one atomic, deadlock-free unit
//! and records the double-entry audit trail.
//!
//! # Flow
//!
//! ```text
//! TransferRequest ──▶ TransferService ──▶ TransferEngine ──▶ LedgerStore
//!  (authenticated)    (owner, currency,    (one transaction,
//!                      existence checks)    lowest id locked first)
//! ```
//!
//! # Guarantees
//!
//! 1. **Atomicity**: transfer row, both entries and both balance updates
//!    commit together or not at all
//! 2. **Conservation**: the two entries sum to zero
//! 3. **Deadlock freedom**: row locks are always acquired in ascending
//!    account id order

pub mod engine;
pub mod error;
pub mod service;
pub mod types;

pub use engine::TransferEngine;
pub use error::TransferError;
pub use service::TransferService;
pub use types::{TransferRequest, TransferTxParams, TransferTxResult};
