//! The peer directory and its command language.

use crate::error::{Result, TrackerError};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// A set of peer identifiers shared by every connection handler.
///
/// Clones share the same set; every operation serialises on one lock.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    peers: Arc<Mutex<BTreeSet<String>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer. Returns `false` if it was already registered.
    pub async fn join(&self, peer: &str) -> bool {
        let added = self.peers.lock().await.insert(peer.to_string());
        if added {
            info!("registered peer {}", peer);
        }
        added
    }

    /// Remove a peer if present.
    pub async fn leave(&self, peer: &str) -> bool {
        let removed = self.peers.lock().await.remove(peer);
        if removed {
            info!("unregistered peer {}", peer);
        }
        removed
    }

    /// Current peers in sorted order.
    pub async fn peers(&self) -> Vec<String> {
        self.peers.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }

    /// Apply a command; only `GetPeers` produces a reply.
    pub async fn apply(&self, command: &TrackerCommand) -> Option<String> {
        match command {
            TrackerCommand::Join(peer) => {
                self.join(peer).await;
                None
            }
            TrackerCommand::Leave(peer) => {
                self.leave(peer).await;
                None
            }
            TrackerCommand::GetPeers => Some(encode_peer_list(&self.peers().await)),
        }
    }
}

/// A registry request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCommand {
    Join(String),
    Leave(String),
    GetPeers,
}

impl TrackerCommand {
    /// Parse a request line. The command word is case-insensitive.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match (word.to_ascii_uppercase().as_str(), rest) {
            ("GETPEERS", _) => Ok(Self::GetPeers),
            ("JOIN", peer) if !peer.is_empty() => Ok(Self::Join(peer.to_string())),
            ("LEAVE", peer) if !peer.is_empty() => Ok(Self::Leave(peer.to_string())),
            ("JOIN" | "LEAVE", _) => Err(TrackerError::Protocol(format!(
                "{} needs a peer identifier",
                word
            ))),
            _ => Err(TrackerError::Protocol(format!("unknown command {:?}", word))),
        }
    }
}

impl fmt::Display for TrackerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join(peer) => write!(f, "JOIN {}", peer),
            Self::Leave(peer) => write!(f, "LEAVE {}", peer),
            Self::GetPeers => write!(f, "GETPEERS"),
        }
    }
}

/// One identifier per line, newline-terminated.
pub fn encode_peer_list(peers: &[String]) -> String {
    let mut out = peers.join("\n");
    out.push('\n');
    out
}

/// Inverse of [`encode_peer_list`]; blank lines are ignored.
pub fn decode_peer_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
