//! Best-effort block broadcast.

use crate::network::PeerNetwork;
use blockbard_core::BlockRecord;
use tracing::{debug, warn};

impl PeerNetwork {
    /// Send `record` to every other registered peer.
    ///
    /// Unreachable peers are logged and skipped. Returns how many peers
    /// accepted the connection.
    pub async fn broadcast(&self, record: &BlockRecord) -> usize {
        let mut delivered = 0;
        for peer in self.peers().await {
            match self.client().send_block(&peer, record).await {
                Ok(()) => {
                    debug!(index = record.index, "sent block to {}", peer);
                    delivered += 1;
                }
                Err(e) => warn!(index = record.index, "could not send block to {}: {}", peer, e),
            }
        }
        delivered
    }
}
