//! Error types for the node.

use blockbard_chain::BlockchainError;
use blockbard_core::CoreError;
use blockbard_storage::StorageError;
use blockbard_tracker::TrackerError;
use thiserror::Error;

/// Errors that can occur while running a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record error: {0}")]
    Record(#[from] CoreError),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out {0}")]
    Timeout(String),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger error: {0}")]
    Ledger(#[from] BlockchainError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
