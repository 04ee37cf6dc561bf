//! Transfer Types

use serde::{Deserialize, Serialize};

use crate::ledger::{Account, Entry, Transfer};

/// Input of one atomic funds movement. `amount` is in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything one successful transfer wrote, with post-update balances.
/// Not persisted as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Transfer request as received from an authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

impl From<&TransferRequest> for TransferTxParams {
    fn from(req: &TransferRequest) -> Self {
        Self {
            from_account_id: req.from_account_id,
            to_account_id: req.to_account_id,
            amount: req.amount,
        }
    }
}
