//! Core ledger primitives for blockbard.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - SHA-256 hashing and proof-of-work prefix checks
//! - Structural position records and their content addresses
//! - Blocks, their hash payload and their wire record
//! - The ledger-mutation payload

pub mod block;
pub mod error;
pub mod hash;
pub mod payload;
pub mod position;

// Re-export commonly used types at the crate root
pub use block::{Block, BlockParts, BlockRecord, ABSENT_FIELD, GENESIS_DATA};
pub use error::{CoreError, Result};
pub use hash::{leading_zero_digits, meets_difficulty, sha256_hex};
pub use payload::Payload;
pub use position::Position;
