//! Error types for cadence-store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store tag `{0}`: 1-8 printable ASCII characters expected")]
    InvalidTag(String),

    #[error("value under `{tag}` is {len} bytes, expected {expected}")]
    Corrupt {
        tag:      String,
        len:      usize,
        expected: usize,
    },

    #[error("commit without a matching begin")]
    NoTransaction,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;
