//! Error types for the shared drought types.

use thiserror::Error;

/// Result type alias using DroughtError.
pub type DroughtResult<T> = Result<T, DroughtError>;

/// Errors raised while parsing or validating shared domain values.
#[derive(Debug, Error)]
pub enum DroughtError {
    #[error("Unknown drought index: {0}")]
    UnknownIndex(String),

    #[error("Unknown value space: {0}")]
    UnknownValueSpace(String),

    #[error("Invalid month: {0} (expected 1-12)")]
    InvalidMonth(u32),

    #[error("Invalid time filter: {0}")]
    InvalidTimeFilter(String),

    #[error("Invalid range table: {0}")]
    RangeTable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for DroughtError {
    fn from(err: serde_json::Error) -> Self {
        DroughtError::RangeTable(format!("JSON error: {}", err))
    }
}
