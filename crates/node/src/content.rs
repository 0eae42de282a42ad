//! Where block content comes from.
//!
//! The mining loop asks a [`ContentSource`] for the next contribution. A
//! source sees the chain and the positions the node recently lost races
//! for, and answers with text plus the structural position it wants to
//! occupy. The ledger never looks at the text, only at the positions.

use blockbard_chain::Blockchain;
use blockbard_core::{BlockRecord, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Why a source produced nothing this round.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content source unavailable: {0}")]
    Unavailable(String),

    #[error("no free position to write at")]
    Exhausted,
}

/// What a source is shown.
#[derive(Debug, Clone, Default)]
pub struct ContentRequest {
    /// Every block's `data`, oldest first.
    pub payloads: Vec<String>,
    /// The chain as wire records.
    pub chain: Vec<BlockRecord>,
    /// Positions recently lost to other miners.
    pub failed_positions: Vec<Position>,
}

impl ContentRequest {
    /// Snapshot a ledger.
    pub fn from_ledger(ledger: &Blockchain, failed_positions: Vec<Position>) -> Self {
        Self {
            payloads: ledger.payloads(),
            chain: ledger.records(),
            failed_positions,
        }
    }

    /// Position hashes already on the chain.
    pub fn taken_positions(&self) -> HashSet<&str> {
        self.chain
            .iter()
            .filter_map(|record| record.position_hash.as_deref())
            .collect()
    }

    /// Content records recovered from the payloads; other payloads are skipped.
    pub fn content_records(&self) -> impl Iterator<Item = ContentRecord> + '_ {
        self.payloads
            .iter()
            .filter_map(|data| ContentRecord::from_data(data))
    }

    /// Whether `position` was recently lost.
    pub fn recently_failed(&self, position: &Position) -> bool {
        self.failed_positions.contains(position)
    }
}

/// A source's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub content: String,
    /// `None` means "nothing to write this round".
    pub position: Option<Position>,
    pub previous_position: Option<Position>,
}

/// Produces block content.
pub trait ContentSource: Send {
    fn propose(&mut self, request: &ContentRequest) -> Result<Proposal, ContentError>;
}

impl<F> ContentSource for F
where
    F: FnMut(&ContentRequest) -> Result<Proposal, ContentError> + Send,
{
    fn propose(&mut self, request: &ContentRequest) -> Result<Proposal, ContentError> {
        self(request)
    }
}

/// The JSON object stored in a mined block's `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content: String,
    pub author: Option<String>,
    pub position: Option<Position>,
    pub previous_position: Option<Position>,
}

impl ContentRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a block payload, if it is a content record.
    pub fn from_data(data: &str) -> Option<Self> {
        serde_json::from_str(data).ok()
    }
}

const NARRATIVE: &[&str] = &[
    "The lamps of the harbour went out one by one.",
    "A stranger climbed the hill road carrying nothing but a map.",
    "Rain found the old bell tower and rang it softly.",
    "The ferryman counted his passengers twice and got two answers.",
    "Beneath the market the river kept its own accounts.",
    "Someone had written the same name on every door.",
    "By morning the map had grown a new road.",
    "The bell answered a question nobody remembered asking.",
];

/// How far past the natural next verse the narrator looks for a free slot.
const VERSE_SEARCH_SPAN: u64 = 64;

/// Built-in source: continues the deepest `{book, chapter, verse}` on the
/// chain, stepping to a later verse when the next one is taken or was
/// recently lost.
#[derive(Debug, Clone, Default)]
pub struct VerseNarrator;

impl VerseNarrator {
    pub fn new() -> Self {
        Self
    }

    fn line(book: u64, chapter: u64, verse: u64) -> String {
        let pick = book.wrapping_add(chapter).wrapping_add(verse) % NARRATIVE.len() as u64;
        format!("{}:{}:{} {}", book, chapter, verse, NARRATIVE[pick as usize])
    }
}

fn verse_key(position: &Position) -> Option<(u64, u64, u64)> {
    Some((
        position.get_u64("book")?,
        position.get_u64("chapter")?,
        position.get_u64("verse")?,
    ))
}

impl ContentSource for VerseNarrator {
    fn propose(&mut self, request: &ContentRequest) -> Result<Proposal, ContentError> {
        let taken = request.taken_positions();

        let deepest = request
            .content_records()
            .filter_map(|record| record.position)
            .filter_map(|position| verse_key(&position).map(|key| (key, position)))
            .filter(|(_, position)| taken.contains(position.hash().as_str()))
            .max_by_key(|(key, _)| *key);

        let ((book, chapter, first_verse), previous_position) = match deepest {
            // A peer's block may sit at the very last verse number.
            Some(((book, chapter, verse), position)) => (
                (book, chapter, verse.checked_add(1).ok_or(ContentError::Exhausted)?),
                Some(position),
            ),
            None => ((1, 1, 1), None),
        };

        (first_verse..=first_verse.saturating_add(VERSE_SEARCH_SPAN - 1))
            .map(|verse| (verse, Position::verse(book, chapter, verse)))
            .find(|(_, position)| {
                !taken.contains(position.hash().as_str()) && !request.recently_failed(position)
            })
            .map(|(verse, position)| Proposal {
                content: Self::line(book, chapter, verse),
                position: Some(position),
                previous_position: previous_position.clone(),
            })
            .ok_or(ContentError::Exhausted)
    }
}
