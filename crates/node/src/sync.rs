//! Longest-chain synchronisation.

use crate::network::PeerNetwork;
use crate::SharedLedger;
use blockbard_core::BlockRecord;
use tracing::{info, warn};

impl PeerNetwork {
    /// Fetch the chain of every registered peer that answers.
    pub async fn collect_chains(&self) -> Vec<Vec<BlockRecord>> {
        let mut chains = Vec::new();
        for peer in self.peers().await {
            match self.client().fetch_chain(&peer).await {
                Ok(chain) => chains.push(chain),
                Err(e) => warn!("could not fetch chain from {}: {}", peer, e),
            }
        }
        chains
    }

    /// Replace the local chain with the longest valid peer chain, if longer.
    ///
    /// Chains are fetched without holding the ledger lock; comparison and
    /// replacement happen under it in one step.
    pub async fn sync(&self, ledger: &SharedLedger) -> bool {
        let candidates = self.collect_chains().await;
        if candidates.is_empty() {
            return false;
        }

        let mut ledger = ledger.lock().await;
        let replaced = ledger.resolve_conflicts(candidates);
        if replaced {
            info!(length = ledger.len(), "synced to longer chain");
        } else {
            info!(length = ledger.len(), "no longer chain found; keeping current");
        }
        replaced
    }
}
