//! Error types for the registry service and its client.

use thiserror::Error;

/// Errors that can occur talking to or serving the registry.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out {0}")]
    Timeout(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
