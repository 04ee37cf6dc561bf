//! Transfer Request Service
//!
//! Checks an authenticated transfer request against the current account rows
//! before handing it to the engine. These reads take no locks; the engine
//! re-resolves both accounts under lock.

use std::sync::Arc;

use crate::ledger::Account;
use crate::token::TokenPayload;

use super::engine::TransferEngine;
use super::error::TransferError;
use super::types::{TransferRequest, TransferTxParams, TransferTxResult};

pub struct TransferService {
    engine: Arc<TransferEngine>,
}

impl TransferService {
    pub fn new(engine: Arc<TransferEngine>) -> Self {
        Self { engine }
    }

    /// Validate and execute a transfer on behalf of `caller`.
    ///
    /// Only the owner of the source account may move funds out of it.
    pub async fn create_transfer(
        &self,
        caller: &TokenPayload,
        req: TransferRequest,
    ) -> Result<TransferTxResult, TransferError> {
        if req.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }
        if req.from_account_id == req.to_account_id {
            return Err(TransferError::SameAccount);
        }

        let from_account = self.valid_account(req.from_account_id, &req.currency).await?;
        if from_account.owner != caller.username {
            tracing::warn!(
                account_id = from_account.id,
                username = %caller.username,
                "Transfer rejected: caller does not own source account"
            );
            return Err(TransferError::NotAccountOwner(from_account.id));
        }

        self.valid_account(req.to_account_id, &req.currency).await?;

        self.engine.transfer(TransferTxParams::from(&req)).await
    }

    async fn valid_account(&self, id: i64, currency: &str) -> Result<Account, TransferError> {
        let account = self.engine.store().get_account(id).await?;
        if account.currency != currency {
            return Err(TransferError::CurrencyMismatch {
                account_id: id,
                expected: currency.to_string(),
                actual: account.currency,
            });
        }
        Ok(account)
    }
}
