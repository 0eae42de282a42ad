//! Ledger-mutation input.

use crate::position::Position;

/// What a caller asks the ledger to append.
///
/// The caller decides which variant it is sending; the ledger never guesses
/// from the shape of the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Plain content with no author or structural position.
    Content(String),
    /// Content anchored at a structural position.
    Structured {
        content: String,
        author: Option<String>,
        position: Option<Position>,
        previous_position: Option<Position>,
    },
}

impl Payload {
    /// Plain content payload.
    pub fn content(content: impl Into<String>) -> Self {
        Self::Content(content.into())
    }

    /// Structured payload at the given position.
    pub fn structured(
        content: impl Into<String>,
        author: Option<String>,
        position: Option<Position>,
        previous_position: Option<Position>,
    ) -> Self {
        Self::Structured {
            content: content.into(),
            author,
            position,
            previous_position,
        }
    }

    /// The content string carried into the block's `data`.
    pub fn data(&self) -> &str {
        match self {
            Self::Content(content) => content,
            Self::Structured { content, .. } => content,
        }
    }

    pub fn author(&self) -> Option<&str> {
        match self {
            Self::Content(_) => None,
            Self::Structured { author, .. } => author.as_deref(),
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            Self::Content(_) => None,
            Self::Structured { position, .. } => position.as_ref(),
        }
    }

    pub fn previous_position(&self) -> Option<&Position> {
        match self {
            Self::Content(_) => None,
            Self::Structured {
                previous_position, ..
            } => previous_position.as_ref(),
        }
    }
}

impl From<&str> for Payload {
    fn from(content: &str) -> Self {
        Self::Content(content.to_string())
    }
}

impl From<String> for Payload {
    fn from(content: String) -> Self {
        Self::Content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_content_has_no_structure() {
        let payload = Payload::from("a line");
        assert_eq!(payload.data(), "a line");
        assert!(payload.author().is_none());
        assert!(payload.position().is_none());
        assert!(payload.previous_position().is_none());
    }

    #[test]
    fn test_structured_accessors() {
        let payload = Payload::structured(
            "a verse",
            Some("me".to_string()),
            Some(Position::verse(1, 1, 2)),
            Some(Position::verse(1, 1, 1)),
        );
        assert_eq!(payload.author(), Some("me"));
        assert_eq!(payload.position(), Some(&Position::verse(1, 1, 2)));
        assert_eq!(payload.previous_position(), Some(&Position::verse(1, 1, 1)));
    }
}
