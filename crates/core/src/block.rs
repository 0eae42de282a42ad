//! Block structure, hash payload and wire record.

use crate::error::Result;
use crate::hash::{meets_difficulty, sha256_hex, GENESIS_PREVIOUS_HASH};
use crate::position::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stand-in for an unset optional field inside the hash payload.
///
/// Absence is hashed, not elided: a block without an author hashes
/// differently from one whose author is the empty string.
pub const ABSENT_FIELD: &str = "None";

/// Payload carried by every genesis block.
pub const GENESIS_DATA: &str = "Genesis Block";

/// The fields of a block before its hash is known.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockParts {
    pub index: u64,
    pub timestamp: f64,
    pub data: String,
    pub author: Option<String>,
    pub previous_hash: String,
    pub nonce: u64,
    pub position_hash: Option<String>,
    pub previous_position_hash: Option<String>,
}

/// A block of the ledger.
///
/// Internally every optional field is kept as an `Option`; the wire form is
/// [`BlockRecord`], which drops unset fields entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Ledger position (0 for genesis).
    pub index: u64,
    /// Creation time in seconds since the Unix epoch.
    pub timestamp: f64,
    /// Opaque payload, conventionally a serialized content record.
    pub data: String,
    /// Identifier of the producing node, if any.
    pub author: Option<String>,
    /// Hex digest of the predecessor.
    pub previous_hash: String,
    /// Proof-of-work search counter.
    pub nonce: u64,
    /// Hex digest of this block's canonical fields.
    pub hash: String,
    /// Content address of the structural position this block occupies.
    pub position_hash: Option<String>,
    /// Content address of the position this block continues from.
    pub previous_position_hash: Option<String>,
}

impl Block {
    /// Build a block and compute its hash from the given fields.
    pub fn new(parts: BlockParts) -> Self {
        let hash = compute_hash(&parts);
        Self::with_hash(parts, hash)
    }

    /// Build a block with a hash supplied from elsewhere (e.g. the wire).
    ///
    /// The hash is trusted as given; validation is the ledger's job.
    pub fn with_hash(parts: BlockParts, hash: String) -> Self {
        Self {
            index: parts.index,
            timestamp: parts.timestamp,
            data: parts.data,
            author: parts.author,
            previous_hash: parts.previous_hash,
            nonce: parts.nonce,
            hash,
            position_hash: parts.position_hash,
            previous_position_hash: parts.previous_position_hash,
        }
    }

    /// Create a genesis block stamped with the given time.
    pub fn genesis(timestamp: f64) -> Self {
        Self::new(BlockParts {
            index: 0,
            timestamp,
            data: GENESIS_DATA.to_string(),
            author: None,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
            position_hash: Some(Position::genesis().hash()),
            previous_position_hash: None,
        })
    }

    /// The canonical string that gets hashed.
    pub fn hash_payload(&self) -> String {
        hash_payload(
            self.index,
            self.timestamp,
            &self.data,
            self.author.as_deref(),
            &self.previous_hash,
            self.nonce,
            self.position_hash.as_deref(),
            self.previous_position_hash.as_deref(),
        )
    }

    /// Recompute the hash from the current field values.
    pub fn compute_hash(&self) -> String {
        sha256_hex(self.hash_payload().as_bytes())
    }

    /// Check that the stored hash matches the fields.
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Check the stored hash against a proof-of-work difficulty.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Check if this is a genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// Convert to the wire record.
    pub fn to_record(&self) -> BlockRecord {
        BlockRecord::from(self)
    }

    /// Get the current Unix time as fractional seconds.
    pub fn current_timestamp() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block #{} [{}]\nAuthor: {}\nHash: {}\nPrev: {}",
            self.index,
            format_timestamp(self.timestamp),
            self.author.as_deref().unwrap_or("-"),
            self.hash,
            self.previous_hash
        )
    }
}

/// Format a timestamp the way it enters the hash payload.
///
/// Shortest round-trip decimal that always keeps a fractional part, so
/// `1700000000` is written `1700000000.0`.
pub fn format_timestamp(timestamp: f64) -> String {
    format!("{timestamp:?}")
}

fn compute_hash(parts: &BlockParts) -> String {
    let payload = hash_payload(
        parts.index,
        parts.timestamp,
        &parts.data,
        parts.author.as_deref(),
        &parts.previous_hash,
        parts.nonce,
        parts.position_hash.as_deref(),
        parts.previous_position_hash.as_deref(),
    );
    sha256_hex(payload.as_bytes())
}

#[allow(clippy::too_many_arguments)]
fn hash_payload(
    index: u64,
    timestamp: f64,
    data: &str,
    author: Option<&str>,
    previous_hash: &str,
    nonce: u64,
    position_hash: Option<&str>,
    previous_position_hash: Option<&str>,
) -> String {
    format!(
        "{index}{}{data}{}{previous_hash}{nonce}{}{}",
        format_timestamp(timestamp),
        author.unwrap_or(ABSENT_FIELD),
        position_hash.unwrap_or(ABSENT_FIELD),
        previous_position_hash.unwrap_or(ABSENT_FIELD),
    )
}

/// Transport form of a block.
///
/// Unset optional fields are omitted from the JSON object rather than sent
/// as `null`, unlike the hash payload which writes a sentinel for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub index: u64,
    pub timestamp: f64,
    pub data: String,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_position_hash: Option<String>,
}

impl BlockRecord {
    /// Parse a record from its JSON encoding.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode the record as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON array of records.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Encode a slice of records as a JSON array.
    pub fn list_to_json(records: &[Self]) -> Result<String> {
        Ok(serde_json::to_string(records)?)
    }
}

impl From<&Block> for BlockRecord {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            timestamp: block.timestamp,
            data: block.data.clone(),
            previous_hash: block.previous_hash.clone(),
            nonce: block.nonce,
            hash: block.hash.clone(),
            author: block.author.clone(),
            position_hash: block.position_hash.clone(),
            previous_position_hash: block.previous_position_hash.clone(),
        }
    }
}

impl From<BlockRecord> for Block {
    fn from(record: BlockRecord) -> Self {
        Block::with_hash(
            BlockParts {
                index: record.index,
                timestamp: record.timestamp,
                data: record.data,
                author: record.author,
                previous_hash: record.previous_hash,
                nonce: record.nonce,
                position_hash: record.position_hash,
                previous_position_hash: record.previous_position_hash,
            },
            record.hash,
        )
    }
}
