//! Errors for core ledger primitives.

use thiserror::Error;

/// Errors raised while decoding or building core records.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed block record: {0}")]
    MalformedRecord(#[from] serde_json::Error),

    #[error("position must be a JSON object, got {0}")]
    InvalidPosition(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
