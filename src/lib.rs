//! bank_ledger - Double-Entry Ledger Service
//!
//! Accounts hold balances, every funds movement is recorded as a transfer
//! plus one entry per side, and all of it commits atomically.
//!
//! # Modules
//!
//! - [`ledger`] - Account/entry/transfer rows and the transactional store
//! - [`transfer`] - Transfer engine (deadlock-free lock ordering) and request service
//! - [`token`] - Bearer token makers (JWT, PASETO v2.local)
//! - [`auth`] - `Authorization` header verification
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL pool and migrations

pub mod auth;
pub mod config;
pub mod db;
pub mod ledger;
pub mod logging;
pub mod token;
pub mod transfer;

// Convenient re-exports at crate root
pub use auth::{AuthError, authorize};
pub use config::{AppConfig, TokenConfig, TokenKind};
pub use ledger::{
    Account, CreateAccountParams, Entry, LedgerStore, LedgerTx, MemoryLedgerStore,
    PgLedgerStore, StoreError, Transfer,
};
pub use token::{TokenError, TokenMaker, TokenPayload, build_token_maker};
pub use transfer::{
    TransferEngine, TransferError, TransferRequest, TransferService, TransferTxParams,
    TransferTxResult,
};
