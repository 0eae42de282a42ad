//! Client side of the registry protocol.

use crate::error::{Result, TrackerError};
use crate::registry::{decode_peer_list, TrackerCommand};
use crate::wire::{self, FrameLimits};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Talks to a registry at a fixed address.
///
/// Each call opens its own connection, sends one command and waits for the
/// registry to close the connection, so a `join` has been applied by the
/// time it returns.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    addr: String,
    connect_timeout: Duration,
    limits: FrameLimits,
}

impl TrackerClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(2),
            limits: FrameLimits::default(),
        }
    }

    /// Override the connect timeout and read bounds.
    pub fn with_timeouts(mut self, connect_timeout: Duration, limits: FrameLimits) -> Self {
        self.connect_timeout = connect_timeout;
        self.limits = limits;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Register `peer`.
    pub async fn join(&self, peer: &str) -> Result<()> {
        self.request(&TrackerCommand::Join(peer.to_string()))
            .await
            .map(|_| ())
    }

    /// Unregister `peer`.
    pub async fn leave(&self, peer: &str) -> Result<()> {
        self.request(&TrackerCommand::Leave(peer.to_string()))
            .await
            .map(|_| ())
    }

    /// Fetch the registered peers.
    pub async fn peers(&self) -> Result<Vec<String>> {
        let reply = self.request(&TrackerCommand::GetPeers).await?;
        Ok(reply.map(|text| decode_peer_list(&text)).unwrap_or_default())
    }

    async fn request(&self, command: &TrackerCommand) -> Result<Option<String>> {
        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| TrackerError::Timeout(format!("connecting to tracker {}", self.addr)))??;

        wire::write_line(&mut stream, &command.to_string()).await?;
        stream.shutdown().await?;

        Ok(wire::read_to_close(&mut stream, &self.limits).await?)
    }
}
