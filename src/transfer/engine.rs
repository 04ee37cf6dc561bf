//! Transfer Transaction Engine
//!
//! Moves funds between two accounts as one atomic unit:
//!
//! ```text
//! BEGIN
//!   INSERT transfer (from, to, amount)
//!   INSERT entry    (from, -amount)
//!   INSERT entry    (to,   +amount)
//!   lock + adjust   min(from, to)
//!   lock + adjust   max(from, to)
//! COMMIT            (any error: ROLLBACK)
//! ```
//!
//! Row locks are always taken lowest account id first. Two transfers over the
//! same pair in opposite directions therefore request locks in the same
//! order and one simply waits for the other.

use std::sync::Arc;

use crate::ledger::{Account, LedgerStore, StoreError, Tx, run_in_transaction};

use super::error::TransferError;
use super::types::{TransferTxParams, TransferTxResult};

pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Execute one transfer.
    ///
    /// No retry is attempted. A failed call leaves no trace and may be
    /// retried; a call that fails ambiguously (e.g. cancelled while
    /// committing) must be reconciled against the transfers table first.
    pub async fn transfer(
        &self,
        params: TransferTxParams,
    ) -> Result<TransferTxResult, TransferError> {
        if params.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        let TransferTxParams {
            from_account_id,
            to_account_id,
            amount,
        } = params;

        let result = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let transfer = tx
                    .create_transfer(from_account_id, to_account_id, amount)
                    .await?;
                let from_entry = tx.create_entry(from_account_id, -amount).await?;
                let to_entry = tx.create_entry(to_account_id, amount).await?;

                let (from_account, to_account) = if from_account_id < to_account_id {
                    move_funds(tx, from_account_id, -amount, to_account_id, amount).await?
                } else {
                    let (to_account, from_account) =
                        move_funds(tx, to_account_id, amount, from_account_id, -amount).await?;
                    if from_account_id == to_account_id {
                        // Both adjustments hit one row; the second read is final.
                        (from_account.clone(), from_account)
                    } else {
                        (from_account, to_account)
                    }
                };

                Ok::<_, TransferError>(TransferTxResult {
                    transfer,
                    from_account,
                    to_account,
                    from_entry,
                    to_entry,
                })
            })
        })
        .await;

        match &result {
            Ok(res) => tracing::info!(
                transfer_id = res.transfer.id,
                from_account_id,
                to_account_id,
                amount,
                "Transfer committed"
            ),
            Err(e) if e.is_not_found() => tracing::warn!(
                from_account_id,
                to_account_id,
                amount,
                "Transfer rolled back: {}",
                e
            ),
            Err(e) => tracing::error!(
                from_account_id,
                to_account_id,
                amount,
                "Transfer rolled back: {}",
                e
            ),
        }

        result
    }
}

/// Lock and adjust `first_id` then `second_id`. Callers pass the lower id
/// first.
async fn move_funds(
    tx: &mut Tx,
    first_id: i64,
    first_delta: i64,
    second_id: i64,
    second_delta: i64,
) -> Result<(Account, Account), StoreError> {
    let first = lock_and_adjust(tx, first_id, first_delta).await?;
    let second = lock_and_adjust(tx, second_id, second_delta).await?;
    Ok((first, second))
}

async fn lock_and_adjust(tx: &mut Tx, id: i64, delta: i64) -> Result<Account, StoreError> {
    tx.get_account_for_update(id).await?;
    tx.add_account_balance(id, delta).await
}
