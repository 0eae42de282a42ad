//! The peer listener.
//!
//! Each connection carries one request. `GETCHAIN` is answered from a
//! snapshot taken under the ledger lock; `BLOCK` is applied directly when it
//! extends the local tip and otherwise triggers a full sync.

use crate::error::Result;
use crate::network::PeerNetwork;
use crate::protocol::{encode_chain, PeerRequest};
use crate::SharedLedger;
use blockbard_core::BlockRecord;
use blockbard_tracker::{wire, FrameLimits};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// What a gossiped block led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDisposition {
    /// Appended as the new tip.
    Appended,
    /// Dropped: its position is already taken.
    DuplicatePosition,
    /// Dropped: it extended the tip but failed validation.
    Rejected,
    /// It did not extend the tip; a sync ran. `true` if the chain changed.
    Synced(bool),
}

/// Listener state shared by every connection handler.
#[derive(Debug, Clone)]
pub struct PeerService {
    ledger: SharedLedger,
    network: PeerNetwork,
    limits: FrameLimits,
}

impl PeerService {
    pub fn new(ledger: SharedLedger, network: PeerNetwork, limits: FrameLimits) -> Self {
        Self {
            ledger,
            network,
            limits,
        }
    }

    /// Accept connections forever.
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        info!("Peer listener on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let service = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = service.handle_connection(stream).await {
                            warn!("Peer connection from {} failed: {}", remote, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept peer connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let line = match wire::read_line(&mut stream, &self.limits).await? {
            Some(line) => line,
            None => return Ok(()),
        };

        let request = PeerRequest::parse(&line)?;
        debug!("peer request: {}", request);

        match request {
            PeerRequest::GetChain => {
                let reply = encode_chain(&self.ledger.lock().await.records())?;
                wire::write_line(&mut stream, &reply).await?;
                stream.shutdown().await?;
            }
            PeerRequest::Block(record) => {
                // The sender expects no reply; release it before a possible sync.
                drop(stream);
                self.handle_block(record).await;
            }
        }
        Ok(())
    }

    /// Apply a gossiped block.
    pub async fn handle_block(&self, record: BlockRecord) -> BlockDisposition {
        {
            let mut ledger = self.ledger.lock().await;

            if let Some(position) = record.position_hash.as_deref() {
                if ledger.contains_position(position) {
                    warn!(index = record.index, "dropping block at a taken position");
                    return BlockDisposition::DuplicatePosition;
                }
            }

            let tip = ledger.latest_block();
            let (tip_index, links_to_tip) = (tip.index, record.previous_hash == tip.hash);
            // A fresh ledger accepts any block #1 by adopting its genesis hash.
            let extends_tip = record.index == tip_index + 1 && (links_to_tip || ledger.len() == 1);
            if extends_tip {
                return if ledger.add_block_from_record(record) {
                    BlockDisposition::Appended
                } else {
                    BlockDisposition::Rejected
                };
            }

            info!(
                index = record.index,
                local_tip = tip_index,
                "out-of-order block; syncing"
            );
        }

        BlockDisposition::Synced(self.network.sync(&self.ledger).await)
    }
}

/// Bind the peer listener.
pub async fn bind(addr: &str) -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    Ok((listener, local))
}
