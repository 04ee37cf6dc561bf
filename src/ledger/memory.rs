//! In-memory Ledger Store
//!
//! Each account row has its own async mutex. A transaction keeps the owned
//! guard of every row it locked until it commits or is dropped, so a second
//! transaction touching the same row waits the same way it would on a
//! database row lock. Writes are buffered in the transaction and applied to
//! the shared tables only on commit.
//!
//! Commits publish under the write side of one table-wide `RwLock` and plain
//! reads take the read side, so a reader sees either all of a transaction or
//! none of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard, RwLock};

use super::error::StoreError;
use super::models::{Account, CreateAccountParams, Entry, Transfer};
use super::store::{LedgerStore, LedgerTx, Tx};

#[derive(Default)]
struct Tables {
    accounts: DashMap<i64, Account>,
    row_locks: DashMap<i64, Arc<RowLock<()>>>,
    /// Write side held while a commit or delete is applied
    publish: RwLock<()>,
    entries: Mutex<Vec<Entry>>,
    transfers: Mutex<Vec<Transfer>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
}

impl Tables {
    fn next_id(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn account(&self, id: i64) -> Result<Account, StoreError> {
        self.accounts
            .get(&id)
            .map(|row| row.value().clone())
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    /// Wait for the row lock of `id`. Existence is checked again once the
    /// lock is held, since a delete may have won the race.
    async fn lock_row(&self, id: i64) -> Result<OwnedMutexGuard<()>, StoreError> {
        if !self.accounts.contains_key(&id) {
            return Err(StoreError::account_not_found(id));
        }
        let lock = self.row_locks.entry(id).or_default().clone();
        let guard = lock.lock_owned().await;
        if !self.accounts.contains_key(&id) {
            return Err(StoreError::account_not_found(id));
        }
        Ok(guard)
    }

    fn is_referenced(&self, id: i64) -> bool {
        let in_entries = lock_table(&self.entries)
            .iter()
            .any(|e| e.account_id == id);
        in_entries
            || lock_table(&self.transfers)
                .iter()
                .any(|t| t.from_account_id == id || t.to_account_id == id)
    }
}

fn lock_table<T>(table: &Mutex<Vec<T>>) -> std::sync::MutexGuard<'_, Vec<T>> {
    // A panic while holding the guard cannot leave a half-applied row behind:
    // rows are pushed whole.
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared, cloneable in-process store
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    tables: Arc<Tables>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Tx, StoreError> {
        Ok(Box::new(MemoryLedgerTx {
            tables: self.tables.clone(),
            held: HashMap::new(),
            deltas: HashMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }))
    }

    async fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        let _published = self.tables.publish.read().await;
        self.tables.account(id)
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let account = Account {
            id: Tables::next_id(&self.tables.account_seq),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn delete_account(&self, id: i64) -> Result<(), StoreError> {
        let _guard = self.tables.lock_row(id).await?;
        let _published = self.tables.publish.write().await;
        if self.tables.is_referenced(id) {
            return Err(StoreError::Constraint(format!(
                "account {id} is still referenced by entries or transfers"
            )));
        }
        self.tables.accounts.remove(&id);
        self.tables.row_locks.remove(&id);
        Ok(())
    }

    async fn list_accounts(
        &self,
        owner: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>, StoreError> {
        let _published = self.tables.publish.read().await;
        let mut accounts: Vec<Account> = self
            .tables
            .accounts
            .iter()
            .filter(|row| row.owner == owner)
            .map(|row| row.value().clone())
            .collect();
        accounts.sort_by_key(|a| a.id);

        Ok(accounts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>, StoreError> {
        let _published = self.tables.publish.read().await;
        let mut entries: Vec<Entry> = lock_table(&self.tables.entries)
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn list_transfers(
        &self,
        account_a: i64,
        account_b: i64,
    ) -> Result<Vec<Transfer>, StoreError> {
        let _published = self.tables.publish.read().await;
        let mut transfers: Vec<Transfer> = lock_table(&self.tables.transfers)
            .iter()
            .filter(|t| {
                (t.from_account_id == account_a && t.to_account_id == account_b)
                    || (t.from_account_id == account_b && t.to_account_id == account_a)
            })
            .cloned()
            .collect();
        transfers.sort_by_key(|t| t.id);
        Ok(transfers)
    }
}

struct MemoryLedgerTx {
    tables: Arc<Tables>,
    /// Row locks held by this transaction
    held: HashMap<i64, OwnedMutexGuard<()>>,
    /// Uncommitted balance changes per account
    deltas: HashMap<i64, i64>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl MemoryLedgerTx {
    async fn ensure_locked(&mut self, id: i64) -> Result<(), StoreError> {
        if !self.held.contains_key(&id) {
            let guard = self.tables.lock_row(id).await?;
            self.held.insert(id, guard);
        }
        Ok(())
    }

    /// Committed row with this transaction's pending delta applied
    fn current(&self, id: i64) -> Result<Account, StoreError> {
        let mut account = self.tables.account(id)?;
        if let Some(delta) = self.deltas.get(&id) {
            account.balance += delta;
        }
        Ok(account)
    }

    /// Foreign keys are checked at commit, like the deferred constraints of
    /// the PostgreSQL schema.
    fn check_references(&self) -> Result<(), StoreError> {
        let referenced = self.entries.iter().map(|e| e.account_id).chain(
            self.transfers
                .iter()
                .flat_map(|t| [t.from_account_id, t.to_account_id]),
        );
        for id in referenced {
            if !self.tables.accounts.contains_key(&id) {
                return Err(StoreError::Constraint(format!(
                    "account {id} does not exist (foreign key)"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        self.ensure_locked(id).await?;
        self.current(id)
    }

    async fn add_account_balance(&mut self, id: i64, delta: i64) -> Result<Account, StoreError> {
        self.ensure_locked(id).await?;
        let mut account = self.current(id)?;
        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| StoreError::Database(format!("balance overflow on account {id}")))?;
        *self.deltas.entry(id).or_insert(0) += delta;
        Ok(account)
    }

    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, StoreError> {
        let entry = Entry {
            id: Tables::next_id(&self.tables.entry_seq),
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer, StoreError> {
        let transfer = Transfer {
            id: Tables::next_id(&self.tables.transfer_seq),
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let tables = self.tables.clone();
        let published = tables.publish.write().await;
        self.check_references()?;

        let MemoryLedgerTx {
            held,
            deltas,
            entries,
            transfers,
            ..
        } = *self;

        for (id, delta) in deltas {
            // Row lock is held, so the account cannot have been deleted.
            if let Some(mut row) = tables.accounts.get_mut(&id) {
                row.balance += delta;
            }
        }
        lock_table(&tables.entries).extend(entries);
        lock_table(&tables.transfers).extend(transfers);

        drop(published);
        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn open(store: &MemoryLedgerStore, owner: &str, balance: i64) -> Account {
        store
            .create_account(CreateAccountParams {
                owner: owner.to_string(),
                balance,
                currency: "USD".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let store = MemoryLedgerStore::new();
        let account = open(&store, "alice", 100).await;

        let fetched = store.get_account(account.id).await.unwrap();
        assert_eq!(fetched, account);
        assert_eq!(fetched.balance, 100);
    }

    #[tokio::test]
    async fn test_get_missing_account_is_not_found() {
        let store = MemoryLedgerStore::new();
        let err = store.get_account(42).await.unwrap_err();
        assert_eq!(err, StoreError::account_not_found(42));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let store = MemoryLedgerStore::new();
        let account = open(&store, "alice", 100).await;

        let mut tx = store.begin().await.unwrap();
        let updated = tx.add_account_balance(account.id, -40).await.unwrap();
        assert_eq!(updated.balance, 60);
        tx.create_entry(account.id, -40).await.unwrap();

        assert_eq!(store.get_account(account.id).await.unwrap().balance, 100);
        assert!(store.list_entries(account.id).await.unwrap().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(store.get_account(account.id).await.unwrap().balance, 60);
        assert_eq!(store.list_entries(account.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = MemoryLedgerStore::new();
        let a = open(&store, "alice", 100).await;
        let b = open(&store, "bob", 0).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_transfer(a.id, b.id, 10).await.unwrap();
            tx.add_account_balance(a.id, -10).await.unwrap();
        }

        assert_eq!(store.get_account(a.id).await.unwrap().balance, 100);
        assert!(store.list_transfers(a.id, b.id).await.unwrap().is_empty());

        // Lock was released by the drop
        let mut tx = store.begin().await.unwrap();
        tx.get_account_for_update(a.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_transaction() {
        let store = MemoryLedgerStore::new();
        let account = open(&store, "alice", 100).await;

        let id = account.id;

        let mut first = store.begin().await.unwrap();
        first.get_account_for_update(id).await.unwrap();

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                let row = tx.add_account_balance(id, 5).await.unwrap();
                tx.commit().await.unwrap();
                row.balance
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        first.add_account_balance(id, -20).await.unwrap();
        first.commit().await.unwrap();

        // Second writer sees the first one's committed balance
        assert_eq!(contender.await.unwrap(), 85);
        assert_eq!(store.get_account(id).await.unwrap().balance, 85);
    }

    #[tokio::test]
    async fn test_relocking_held_row_does_not_block() {
        let store = MemoryLedgerStore::new();
        let account = open(&store, "alice", 10).await;

        let mut tx = store.begin().await.unwrap();
        tx.get_account_for_update(account.id).await.unwrap();
        tx.add_account_balance(account.id, 1).await.unwrap();
        let row = tx.get_account_for_update(account.id).await.unwrap();
        assert_eq!(row.balance, 11);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_entry_for_missing_account_fails_at_commit() {
        let store = MemoryLedgerStore::new();
        let account = open(&store, "alice", 0).await;

        let mut tx = store.begin().await.unwrap();
        tx.create_entry(account.id, 5).await.unwrap();
        tx.create_entry(99, 5).await.unwrap();
        let err = tx.commit().await.unwrap_err();

        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(store.list_entries(account.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_account() {
        let store = MemoryLedgerStore::new();
        let a = open(&store, "alice", 0).await;
        let b = open(&store, "alice", 0).await;

        store.delete_account(a.id).await.unwrap();
        assert!(store.get_account(a.id).await.unwrap_err().is_not_found());
        assert!(store.delete_account(a.id).await.unwrap_err().is_not_found());

        let mut tx = store.begin().await.unwrap();
        tx.create_entry(b.id, 3).await.unwrap();
        tx.commit().await.unwrap();

        let err = store.delete_account(b.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_list_accounts_paginates_by_id() {
        let store = MemoryLedgerStore::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(open(&store, "alice", 0).await.id);
        }
        open(&store, "bob", 0).await;

        let page = store.list_accounts("alice", 2, 1).await.unwrap();
        let page_ids: Vec<i64> = page.iter().map(|a| a.id).collect();
        assert_eq!(page_ids, vec![ids[1], ids[2]]);
        assert!(page.iter().all(|a| a.owner == "alice"));
    }
}
