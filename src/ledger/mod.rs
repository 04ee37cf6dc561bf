//! Ledger Store
//!
//! Durable storage for accounts, entries and transfers.
//!
//! # Tables
//!
//! ```text
//! accounts  (id, owner, balance, currency, created_at)
//! entries   (id, account_id -> accounts, amount, created_at)
//! transfers (id, from_account_id -> accounts, to_account_id -> accounts, amount, created_at)
//! ```
//!
//! Accounts support two reads: a plain read and a lock-for-update read whose
//! row lock lives until the enclosing transaction ends. Entries and transfers
//! are write-once.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryLedgerStore;
pub use models::{Account, CreateAccountParams, Entry, Transfer};
pub use postgres::PgLedgerStore;
pub use store::{LedgerStore, LedgerTx, Tx, run_in_transaction};
