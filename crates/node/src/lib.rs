//! Peer node for blockbard.
//!
//! A node owns one ledger and runs two activities against it:
//! - a **listener** answering `GETCHAIN` and accepting gossiped `BLOCK`s,
//!   falling back to a longest-chain sync when a block does not fit the tip
//! - a **mining loop** that asks a [`ContentSource`] for the next
//!   contribution, mines it without holding the ledger lock and gossips it
//!
//! Peers are discovered through the tracker. All ledger mutation goes
//! through one async mutex.
//!
//! # Example
//!
//! ```rust,no_run
//! use blockbard_node::{Node, NodeConfig, VerseNarrator};
//!
//! # async fn demo() -> blockbard_node::Result<()> {
//! let config = NodeConfig {
//!     listen_addr: "127.0.0.1:9000".to_string(),
//!     tracker_addr: "127.0.0.1:8000".to_string(),
//!     ..NodeConfig::default()
//! };
//! let node = Node::start(config, Some(Box::new(VerseNarrator::new()))).await?;
//! println!("{} has {} blocks", node.node_id(), node.chain_length().await);
//! node.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod gossip;
pub mod mining;
pub mod network;
pub mod node;
pub mod protocol;
pub mod server;
pub mod sync;

use blockbard_chain::Blockchain;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The ledger as shared between the listener and the mining loop.
pub type SharedLedger = Arc<Mutex<Blockchain>>;

pub use config::NodeConfig;
pub use content::{ContentError, ContentRecord, ContentRequest, ContentSource, Proposal, VerseNarrator};
pub use error::{NodeError, Result};
pub use mining::{MiningLoop, MiningSettings, RoundOutcome};
pub use network::{PeerClient, PeerNetwork};
pub use node::Node;
pub use protocol::PeerRequest;
pub use server::{BlockDisposition, PeerService};
