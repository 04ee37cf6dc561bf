//! Transfer Error Types

use thiserror::Error;

use crate::ledger::StoreError;

/// Transfer error types
///
/// Store faults other than not-found are opaque here: they are reported as
/// internal failures and never interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and target account cannot be the same")]
    SameAccount,

    #[error("Account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        expected: String,
        actual: String,
    },

    // === Authorization Errors ===
    #[error("Account {0} doesn't belong to the authenticated user")]
    NotAccountOwner(i64),

    // === Store Errors ===
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransferError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransferError::Store(e) if e.is_not_found())
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            TransferError::NotAccountOwner(_) => "NOT_ACCOUNT_OWNER",
            TransferError::Store(StoreError::NotFound { .. }) => "ACCOUNT_NOT_FOUND",
            TransferError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidAmount
            | TransferError::SameAccount
            | TransferError::CurrencyMismatch { .. } => 400,
            TransferError::NotAccountOwner(_) => 401,
            TransferError::Store(StoreError::NotFound { .. }) => 404,
            TransferError::Store(_) => 500,
        }
    }

    /// Message safe to hand to a client. Storage faults are not described.
    pub fn public_message(&self) -> String {
        match self {
            TransferError::Store(StoreError::NotFound { .. }) => "Account not found".to_string(),
            TransferError::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(TransferError::InvalidAmount.code(), "INVALID_AMOUNT");
        assert_eq!(
            TransferError::from(StoreError::account_not_found(3)).code(),
            "ACCOUNT_NOT_FOUND"
        );
        assert_eq!(
            TransferError::from(StoreError::Database("reset".into())).code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransferError::InvalidAmount.http_status(), 400);
        assert_eq!(TransferError::NotAccountOwner(1).http_status(), 401);
        assert_eq!(
            TransferError::from(StoreError::account_not_found(1)).http_status(),
            404
        );
        assert_eq!(
            TransferError::from(StoreError::Constraint("fk".into())).http_status(),
            500
        );
    }

    #[test]
    fn test_storage_detail_is_not_leaked() {
        let err = TransferError::from(StoreError::Database("password auth failed".into()));
        assert_eq!(err.public_message(), "Internal server error");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display() {
        let err = TransferError::CurrencyMismatch {
            account_id: 2,
            expected: "USD".into(),
            actual: "EUR".into(),
        };
        assert_eq!(err.to_string(), "Account 2 currency mismatch: EUR vs USD");
    }
}
