//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row cannot be decoded into its record type.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A write would break a stored invariant (stale epoch, partial rotation).
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The backend could not run the operation (poisoned lock, lost task).
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
