//! Peer-to-peer messages.
//!
//! ```text
//! GETCHAIN              ->  CHAIN [<block record>, ...]
//! BLOCK <block record>  ->  (no reply)
//! ```

use crate::error::{NodeError, Result};
use blockbard_core::BlockRecord;
use std::fmt;

const GETCHAIN: &str = "GETCHAIN";
const BLOCK_PREFIX: &str = "BLOCK ";
const CHAIN_PREFIX: &str = "CHAIN ";

/// A request sent to a node's listener.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerRequest {
    /// Ask for the full chain.
    GetChain,
    /// Gossip one sealed block.
    Block(BlockRecord),
}

impl PeerRequest {
    /// Parse a request line.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end();
        if line == GETCHAIN {
            return Ok(Self::GetChain);
        }
        if let Some(json) = line.strip_prefix(BLOCK_PREFIX) {
            return Ok(Self::Block(BlockRecord::from_json(json)?));
        }

        let word = line.split_whitespace().next().unwrap_or_default();
        Err(NodeError::Protocol(format!("unknown request {:?}", word)))
    }

    /// The request as one line, without the terminator.
    pub fn encode(&self) -> Result<String> {
        match self {
            Self::GetChain => Ok(GETCHAIN.to_string()),
            Self::Block(record) => Ok(format!("{}{}", BLOCK_PREFIX, record.to_json()?)),
        }
    }
}

impl fmt::Display for PeerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetChain => write!(f, "{}", GETCHAIN),
            Self::Block(record) => write!(f, "BLOCK #{}", record.index),
        }
    }
}

/// `CHAIN <json array>` reply line.
pub fn encode_chain(records: &[BlockRecord]) -> Result<String> {
    Ok(format!("{}{}", CHAIN_PREFIX, BlockRecord::list_to_json(records)?))
}

/// Parse a `CHAIN` reply.
pub fn decode_chain(line: &str) -> Result<Vec<BlockRecord>> {
    let json = line
        .trim_end()
        .strip_prefix(CHAIN_PREFIX)
        .ok_or_else(|| NodeError::Protocol("expected a CHAIN reply".to_string()))?;
    Ok(BlockRecord::list_from_json(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockbard_core::Block;

    fn genesis_record() -> BlockRecord {
        Block::genesis(1_700_000_000.0).to_record()
    }

    #[test]
    fn test_parse_getchain() {
        assert_eq!(PeerRequest::parse("GETCHAIN").unwrap(), PeerRequest::GetChain);
        assert_eq!(PeerRequest::parse("GETCHAIN\r").unwrap(), PeerRequest::GetChain);
    }

    #[test]
    fn test_block_request_round_trip() {
        let request = PeerRequest::Block(genesis_record());
        let line = request.encode().unwrap();

        assert!(line.starts_with("BLOCK {"));
        assert_eq!(PeerRequest::parse(&line).unwrap(), request);
    }

    #[test]
    fn test_malformed_block_is_record_error() {
        assert!(matches!(
            PeerRequest::parse("BLOCK {\"index\":1}"),
            Err(NodeError::Record(_))
        ));
    }

    #[test]
    fn test_unknown_request() {
        assert!(matches!(
            PeerRequest::parse("GETBLOCKS 3"),
            Err(NodeError::Protocol(_))
        ));
        assert!(PeerRequest::parse("").is_err());
    }

    #[test]
    fn test_chain_reply() {
        let records = vec![genesis_record()];
        let line = encode_chain(&records).unwrap();

        assert!(line.starts_with("CHAIN ["));
        assert_eq!(decode_chain(&line).unwrap(), records);
        assert!(matches!(
            decode_chain("NOPE []"),
            Err(NodeError::Protocol(_))
        ));
    }
}
