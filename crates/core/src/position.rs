//! Structural position records.
//!
//! A position is a small key/value mapping such as `{book, chapter, verse}`
//! that locates a contribution inside the shared narrative. Positions are
//! content-addressed: the position hash is the SHA-256 of the canonical
//! (sorted-key, compact) JSON encoding, so every node derives the same hash
//! from the same mapping regardless of insertion order.

use crate::error::{CoreError, Result};
use crate::hash::sha256_hex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A structural position record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(Map<String, Value>);

impl Position {
    /// Create an empty position.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insertion of a single key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// The `{book, chapter, verse}` position of the given coordinates.
    pub fn verse(book: u64, chapter: u64, verse: u64) -> Self {
        Self::new()
            .with("book", book)
            .with("chapter", chapter)
            .with("verse", verse)
    }

    /// The all-zero position anchored by every genesis block.
    pub fn genesis() -> Self {
        Self::verse(0, 0, 0)
    }

    /// Build a position from an arbitrary JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::InvalidPosition(other.to_string())),
        }
    }

    /// Look up a single key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a key as an unsigned integer.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    /// Number of keys in the record.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the record has no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical JSON encoding: compact, keys sorted at every nesting level.
    pub fn canonical_json(&self) -> String {
        // serde_json's Map is ordered by key unless `preserve_order` is enabled,
        // which this workspace never turns on.
        Value::Object(self.0.clone()).to_string()
    }

    /// Content address of this position.
    pub fn hash(&self) -> String {
        sha256_hex(self.canonical_json().as_bytes())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_ordering() {
        let a = Position::new()
            .with("verse", 3)
            .with("book", 1)
            .with("chapter", 2);
        let b = Position::verse(1, 2, 3);

        assert_eq!(a.canonical_json(), r#"{"book":1,"chapter":2,"verse":3}"#);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_nested_keys_sorted() {
        let p = Position::from_value(json!({"z": {"b": 1, "a": 2}, "a": 0})).unwrap();
        assert_eq!(p.canonical_json(), r#"{"a":0,"z":{"a":2,"b":1}}"#);
    }

    #[test]
    fn test_distinct_positions_distinct_hashes() {
        assert_ne!(
            Position::verse(1, 1, 1).hash(),
            Position::verse(1, 1, 2).hash()
        );
    }

    #[test]
    fn test_genesis_position() {
        assert_eq!(
            Position::genesis().canonical_json(),
            r#"{"book":0,"chapter":0,"verse":0}"#
        );
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            Position::from_value(json!([1, 2, 3])),
            Err(CoreError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_accessors() {
        let p = Position::verse(4, 5, 6);
        assert_eq!(p.get_u64("chapter"), Some(5));
        assert_eq!(p.get_u64("missing"), None);
        assert_eq!(p.len(), 3);
        assert!(Position::new().is_empty());
    }
}
