//! PostgreSQL Ledger Store
//!
//! Row locks come from `SELECT ... FOR NO KEY UPDATE`, which blocks other
//! lockers and writers of the row but not inserts into tables whose foreign
//! keys reference it.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::error::StoreError;
use super::models::{Account, CreateAccountParams, Entry, Transfer};
use super::store::{LedgerStore, LedgerTx, Tx};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Tx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn get_account(&self, id: i64) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3)
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&params.owner)
        .bind(params.balance)
        .bind(&params.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    async fn delete_account(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::account_not_found(id));
        }
        Ok(())
    }

    async fn list_accounts(
        &self,
        owner: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Account>, StoreError> {
        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner = $1
             ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    async fn list_entries(&self, account_id: i64) -> Result<Vec<Entry>, StoreError> {
        let entries = sqlx::query_as::<_, Entry>(
            "SELECT id, account_id, amount, created_at FROM entries
             WHERE account_id = $1 ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn list_transfers(
        &self,
        account_a: i64,
        account_b: i64,
    ) -> Result<Vec<Transfer>, StoreError> {
        let transfers = sqlx::query_as::<_, Transfer>(
            "SELECT id, from_account_id, to_account_id, amount, created_at FROM transfers
             WHERE (from_account_id = $1 AND to_account_id = $2)
                OR (from_account_id = $2 AND to_account_id = $1)
             ORDER BY id",
        )
        .bind(account_a)
        .bind(account_b)
        .fetch_all(&self.pool)
        .await?;

        Ok(transfers)
    }
}

/// Wraps a live sqlx transaction. sqlx rolls back on drop.
struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1
             FOR NO KEY UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn add_account_balance(&mut self, id: i64, delta: i64) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(delta)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn create_entry(&mut self, account_id: i64, amount: i64) -> Result<Entry, StoreError> {
        let entry = sqlx::query_as::<_, Entry>(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2)
             RETURNING id, account_id, amount, created_at",
        )
        .bind(account_id)
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
    ) -> Result<Transfer, StoreError> {
        let transfer = sqlx::query_as::<_, Transfer>(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) VALUES ($1, $2, $3)
             RETURNING id, from_account_id, to_account_id, amount, created_at",
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(transfer)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
