//! Block and chain validation rules.
//!
//! This module checks blocks and whole chains against the ledger invariants:
//! hash links, hash recomputation, proof-of-work, and the position rules
//! (position hashes are unique, previous-position hashes point backwards).

use blockbard_core::Block;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate position {0}")]
    DuplicatePosition(String),

    #[error("dangling reference to previous position {0}")]
    DanglingReference(String),

    #[error("block {index} previous_hash does not match its predecessor")]
    BrokenLink { index: u64 },

    #[error("block {index} hash does not match its fields")]
    HashMismatch { index: u64 },

    #[error("block {index} does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: usize },

    #[error("chain is empty")]
    EmptyChain,
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Chain validator.
pub struct ChainValidator;

impl ChainValidator {
    /// Check a proposed position against the existing chain.
    ///
    /// A position may not repeat anywhere in the chain. A previous position
    /// must already be some block's position, except when the new block
    /// would be the first one after genesis.
    pub fn validate_position(
        chain: &[Block],
        position_hash: Option<&str>,
        previous_position_hash: Option<&str>,
    ) -> Result<()> {
        if let Some(position) = position_hash {
            if Self::contains_position(chain, position) {
                return Err(ValidationError::DuplicatePosition(position.to_string()));
            }
        }

        if let Some(previous) = previous_position_hash {
            if chain.len() > 1 && !Self::contains_position(chain, previous) {
                return Err(ValidationError::DanglingReference(previous.to_string()));
            }
        }

        Ok(())
    }

    /// Check that a sealed block carries a correct hash with enough work.
    pub fn validate_seal(block: &Block, difficulty: usize) -> Result<()> {
        if !block.has_valid_hash() {
            return Err(ValidationError::HashMismatch { index: block.index });
        }

        if !block.meets_difficulty(difficulty) {
            return Err(ValidationError::InsufficientWork {
                index: block.index,
                difficulty,
            });
        }

        Ok(())
    }

    /// Validate a sealed block as the next block of `chain`.
    pub fn validate_successor(chain: &[Block], block: &Block, difficulty: usize) -> Result<()> {
        let tip = chain.last().ok_or(ValidationError::EmptyChain)?;

        if block.previous_hash != tip.hash {
            return Err(ValidationError::BrokenLink { index: block.index });
        }

        Self::validate_seal(block, difficulty)?;

        Self::validate_position(
            chain,
            block.position_hash.as_deref(),
            block.previous_position_hash.as_deref(),
        )
    }

    /// Validate a full chain in one linear scan.
    ///
    /// The genesis block's own hash is not rechecked: nodes may have adopted
    /// a remote genesis hash that no local field set reproduces.
    pub fn validate_chain(chain: &[Block], difficulty: usize) -> Result<()> {
        let genesis = chain.first().ok_or(ValidationError::EmptyChain)?;

        let mut seen: HashSet<&str> = HashSet::new();
        if let Some(position) = genesis.position_hash.as_deref() {
            seen.insert(position);
        }

        for (i, pair) in chain.windows(2).enumerate() {
            let (prev, curr) = (&pair[0], &pair[1]);

            if curr.previous_hash != prev.hash {
                return Err(ValidationError::BrokenLink { index: curr.index });
            }

            Self::validate_seal(curr, difficulty)?;

            if let Some(previous) = curr.previous_position_hash.as_deref() {
                // `i == 0` is the first block after genesis.
                if i > 0 && !seen.contains(previous) {
                    return Err(ValidationError::DanglingReference(previous.to_string()));
                }
            }

            if let Some(position) = curr.position_hash.as_deref() {
                if !seen.insert(position) {
                    return Err(ValidationError::DuplicatePosition(position.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Check if any block of the chain sits at the given position.
    pub fn contains_position(chain: &[Block], position_hash: &str) -> bool {
        chain
            .iter()
            .any(|block| block.position_hash.as_deref() == Some(position_hash))
    }
}
