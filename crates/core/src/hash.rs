//! SHA-256 hashing utilities for the ledger.
//!
//! Every digest in the system travels as a lowercase hex string, both in the
//! hash payload of a block and on the wire, so these helpers return `String`.

use sha2::{Digest, Sha256};

/// Hex digest of the all-zero "no predecessor" link used by genesis blocks.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Hash arbitrary data using SHA-256, returning a lowercase hex digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Count the leading `'0'` characters of a hex digest.
pub fn leading_zero_digits(hash: &str) -> usize {
    hash.bytes().take_while(|b| *b == b'0').count()
}

/// Check whether a hex digest satisfies a proof-of-work difficulty.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    leading_zero_digits(hash) >= difficulty
}

/// Derive a stable 64-bit seed from an arbitrary identity string.
pub fn seed_from_identity(identity: &str) -> u64 {
    let digest = Sha256::digest(identity.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
