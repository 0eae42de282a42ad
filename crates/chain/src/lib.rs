//! Ledger orchestration for blockbard.
//!
//! This crate brings the core types and consensus rules together into the
//! ledger every node owns:
//! - **Appends**: position checks, proof-of-work mining, difficulty adaptation
//! - **Validation**: full linear scans of the local chain or a candidate
//! - **Peer blocks**: successor checks with genesis adoption
//! - **Fork resolution**: longest valid chain wins
//!
//! # Example
//!
//! ```rust
//! use blockbard_chain::Blockchain;
//! use blockbard_core::{Payload, Position};
//!
//! let mut chain = Blockchain::new(1);
//! chain
//!     .add_block(Payload::structured(
//!         "In the beginning",
//!         Some("node-a:9000".to_string()),
//!         Some(Position::verse(1, 1, 1)),
//!         None,
//!     ))
//!     .unwrap();
//!
//! assert_eq!(chain.len(), 2);
//! assert!(chain.latest_block().hash.starts_with('0'));
//! ```

pub mod blockchain;

// Re-export commonly used types
pub use blockchain::{Blockchain, BlockchainError, Result};
