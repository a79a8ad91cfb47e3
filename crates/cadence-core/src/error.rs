//! Base error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant via `#[from]` where they need it.

use thiserror::Error;

use crate::ModeId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("mode {0} not found")]
    ModeNotFound(ModeId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `cadence-core`.
pub type CoreResult<T> = Result<T, CoreError>;
