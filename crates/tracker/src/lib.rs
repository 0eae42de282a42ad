//! Peer registry for blockbard.
//!
//! The tracker is a directory of peer identifiers (`host:port` strings).
//! Nodes announce themselves with `JOIN`, withdraw with `LEAVE` and discover
//! each other with `GETPEERS`. It holds no chain state and nothing persists
//! across restarts.
//!
//! # Example
//!
//! ```rust,no_run
//! use blockbard_tracker::{TrackerClient, TrackerConfig, TrackerServer};
//!
//! # async fn demo() -> blockbard_tracker::Result<()> {
//! let server = TrackerServer::bind(&TrackerConfig::default()).await?;
//! let addr = server.local_addr()?;
//! tokio::spawn(server.run());
//!
//! let client = TrackerClient::new(addr.to_string());
//! client.join("127.0.0.1:9000").await?;
//! assert_eq!(client.peers().await?, vec!["127.0.0.1:9000".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod wire;

pub use client::TrackerClient;
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use registry::{Registry, TrackerCommand};
pub use server::TrackerServer;
pub use wire::FrameLimits;
