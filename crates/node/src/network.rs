//! Outbound connections: the registry and other nodes.

use crate::error::{NodeError, Result};
use crate::protocol::{decode_chain, PeerRequest};
use blockbard_core::BlockRecord;
use blockbard_tracker::{wire, FrameLimits, TrackerClient};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::warn;

/// One-shot requests to other nodes.
#[derive(Debug, Clone)]
pub struct PeerClient {
    connect_timeout: Duration,
    limits: FrameLimits,
}

impl PeerClient {
    pub fn new(connect_timeout: Duration, limits: FrameLimits) -> Self {
        Self {
            connect_timeout,
            limits,
        }
    }

    async fn connect(&self, peer: &str) -> Result<TcpStream> {
        tokio::time::timeout(self.connect_timeout, TcpStream::connect(peer))
            .await
            .map_err(|_| NodeError::Timeout(format!("connecting to {}", peer)))?
            .map_err(NodeError::from)
    }

    /// Send `request` and half-close the connection.
    async fn send(&self, peer: &str, request: &PeerRequest) -> Result<TcpStream> {
        let mut stream = self.connect(peer).await?;
        wire::write_line(&mut stream, &request.encode()?).await?;
        stream.shutdown().await?;
        Ok(stream)
    }

    /// Fetch a peer's full chain.
    ///
    /// A reply cut short by the read timeout is still parsed; if it does not
    /// parse, the fetch fails.
    pub async fn fetch_chain(&self, peer: &str) -> Result<Vec<BlockRecord>> {
        let mut stream = self.send(peer, &PeerRequest::GetChain).await?;
        let reply = wire::read_line(&mut stream, &self.limits)
            .await?
            .ok_or_else(|| NodeError::Protocol(format!("{} sent no chain", peer)))?;
        decode_chain(&reply)
    }

    /// Gossip one block; no reply is expected.
    pub async fn send_block(&self, peer: &str, record: &BlockRecord) -> Result<()> {
        self.send(peer, &PeerRequest::Block(record.clone())).await?;
        Ok(())
    }
}

/// This node's view of the network: who it is, where the registry is and
/// how to reach peers.
#[derive(Debug, Clone)]
pub struct PeerNetwork {
    self_id: String,
    tracker: TrackerClient,
    client: PeerClient,
}

impl PeerNetwork {
    pub fn new(self_id: impl Into<String>, tracker: TrackerClient, client: PeerClient) -> Self {
        Self {
            self_id: self_id.into(),
            tracker,
            client,
        }
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn tracker(&self) -> &TrackerClient {
        &self.tracker
    }

    pub fn client(&self) -> &PeerClient {
        &self.client
    }

    /// Registered peers other than this node.
    ///
    /// An unreachable registry yields an empty list.
    pub async fn peers(&self) -> Vec<String> {
        match self.tracker.peers().await {
            Ok(peers) => peers
                .into_iter()
                .filter(|peer| peer != &self.self_id)
                .collect(),
            Err(e) => {
                warn!("could not fetch peers from {}: {}", self.tracker.addr(), e);
                Vec::new()
            }
        }
    }
}
