//! Proof of Work consensus for blockbard.
//!
//! This crate provides the consensus rules shared by every node:
//! - Nonce search with cooperative cancellation
//! - Per-node difficulty adaptation from measured mining time
//! - An injectable clock so timing-dependent rules stay testable
//! - Block and chain validation (links, hashes, work, position rules)
//!
//! # Example
//!
//! ```rust
//! use blockbard_consensus::{ChainValidator, Miner, SteppingClock};
//! use blockbard_core::{Block, BlockParts};
//!
//! let genesis = Block::genesis(1_700_000_000.0);
//! let mut block = Block::new(BlockParts {
//!     index: 1,
//!     timestamp: 1_700_000_001.0,
//!     data: "once upon a time".to_string(),
//!     author: None,
//!     previous_hash: genesis.hash.clone(),
//!     nonce: 0,
//!     position_hash: None,
//!     previous_position_hash: None,
//! });
//!
//! let clock = SteppingClock::new(0.0, 5.0);
//! let report = Miner::default().mine_timed(&mut block, 1, &clock).unwrap();
//! assert_eq!(report.elapsed(), 5.0);
//!
//! ChainValidator::validate_chain(&[genesis, block], 1).unwrap();
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{
    Clock, DifficultyPolicy, Miner, MiningError, MiningReport, SteppingClock, SystemClock,
};
pub use validator::{ChainValidator, ValidationError};
