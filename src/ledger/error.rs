//! Ledger Store Error Types

use thiserror::Error;

/// Errors surfaced by ledger store primitives.
///
/// `NotFound` is kept apart from every other fault so callers can map a
/// missing row to a domain outcome. The remaining variants are opaque to the
/// transfer engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{table} row {id} not found")]
    NotFound { table: &'static str, id: i64 },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn account_not_found(id: i64) -> Self {
        StoreError::NotFound {
            table: "accounts",
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match e.as_database_error().map(|db| db.kind()) {
            Some(
                ErrorKind::ForeignKeyViolation
                | ErrorKind::UniqueViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation,
            ) => StoreError::Constraint(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}
