//! Ledger Store Ports
//!
//! A store hands out exactly one transaction handle per atomic unit. Row
//! operations that must commit together go through the handle; plain reads
//! and administrative operations go through the store itself.

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::error::StoreError;
use super::models::{Account, CreateAccountParams, Entry, Transfer};

/// Owned transaction handle.
///
/// Dropping a handle without calling [`LedgerTx::commit`] discards every
/// pending write and releases every row lock it holds.
pub type Tx = Box<dyn LedgerTx>;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Start a new atomic unit
    async fn begin(&self) -> Result<Tx, StoreError>;

    /// Plain read, takes no lock
    async fn get_account(&self, id: i64) -> Result<Account, StoreError>;

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, StoreError>;

    /// Administrative delete. Fails with a constraint error while entries or
    /// transfers still reference the account.
    async fn delete_account(&self, id: i64) -> Result<(), StoreError>;

    /// Accounts of one owner ordered by id
    async fn list_accounts(
        &self,
        owner: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>, StoreError>;

    /// Entries of one account ordered by id
    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>, StoreError>;

    /// Transfers between two accounts in either direction, ordered by id
    async fn list_transfers(
        &self,
        account_a: i64,
        account_b: i64,
    ) -> Result<Vec<Transfer>, StoreError>;
}

/// Row operations scoped to one atomic unit.
///
/// There is no `begin` here: a transaction cannot open a nested one.
#[async_trait]
pub trait LedgerTx: Send {
    /// Read the account and hold its row lock until commit or rollback
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError>;

    /// `balance += delta`, returning the updated row. Takes the row lock if
    /// this transaction does not hold it yet.
    async fn add_account_balance(&mut self, id: i64, delta: i64) -> Result<Account, StoreError>;

    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, StoreError>;

    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Run `f` inside a single transaction.
///
/// Commits when `f` returns `Ok`. Rolls back when `f` returns `Err`, and also
/// when the returned future is dropped before completion.
pub async fn run_in_transaction<T, E, F>(store: &dyn LedgerStore, f: F) -> Result<T, E>
where
    F: for<'t> FnOnce(&'t mut Tx) -> BoxFuture<'t, Result<T, E>> + Send,
    T: Send,
    E: From<StoreError> + std::fmt::Display + Send,
{
    let mut tx = store.begin().await?;

    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb_err) = tx.rollback().await {
                tracing::error!(
                    store = store.name(),
                    error = %rb_err,
                    "Rollback failed after transaction error: {}",
                    e
                );
            }
            Err(e)
        }
    }
}
