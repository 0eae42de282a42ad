//! The mining loop.
//!
//! One round: ask the content source for a proposal, build the candidate
//! under the ledger lock, search for a nonce on a blocking thread with the
//! lock released, then commit under the lock again and gossip the block.
//! Rounds are separated by a pause with jitter seeded from the node's
//! identity, so competing nodes drift apart instead of colliding in lockstep.

use crate::content::{ContentRecord, ContentRequest, ContentSource};
use crate::error::Result;
use crate::network::PeerNetwork;
use crate::SharedLedger;
use blockbard_chain::BlockchainError;
use blockbard_consensus::{Miner, MiningError};
use blockbard_core::hash::seed_from_identity;
use blockbard_core::{Block, Payload, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How a round ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundOutcome {
    /// A block was mined, appended and gossiped.
    Appended(Block),
    /// The source proposed no position.
    NoPosition,
    /// The source failed.
    ContentUnavailable,
    /// The proposed position was lost recently and is being avoided.
    RecentlyFailed(Position),
    /// The position was taken, or its predecessor missing.
    PositionConflict(Position),
    /// Another block landed while searching.
    StaleTip,
    /// The search was interrupted by shutdown.
    Cancelled,
}

/// Pacing and memory settings for [`MiningLoop`].
#[derive(Debug, Clone)]
pub struct MiningSettings {
    pub interval: Duration,
    pub max_jitter: Duration,
    pub failure_memory: usize,
}

/// Repeatedly proposes, mines and gossips blocks.
pub struct MiningLoop {
    author: String,
    ledger: SharedLedger,
    network: PeerNetwork,
    source: Box<dyn ContentSource>,
    miner: Miner,
    settings: MiningSettings,
    failed: VecDeque<Position>,
    rng: StdRng,
}

impl MiningLoop {
    pub fn new(
        ledger: SharedLedger,
        network: PeerNetwork,
        source: Box<dyn ContentSource>,
        cancel: Arc<AtomicBool>,
        settings: MiningSettings,
    ) -> Self {
        let author = network.self_id().to_string();
        let rng = StdRng::seed_from_u64(seed_from_identity(&author));
        Self {
            author,
            ledger,
            network,
            source,
            miner: Miner::new(cancel),
            settings,
            failed: VecDeque::new(),
            rng,
        }
    }

    /// Positions currently being avoided, oldest first.
    pub fn failed_positions(&self) -> Vec<Position> {
        self.failed.iter().cloned().collect()
    }

    /// Run rounds until `shutdown` flips to `true` or the miner is cancelled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(node = %self.author, "mining loop started");

        while !*shutdown.borrow() && !self.miner.is_cancelled() {
            match self.round().await {
                Ok(RoundOutcome::Cancelled) => break,
                Ok(outcome) => debug!(?outcome, "mining round finished"),
                Err(e) => warn!("mining round failed: {}", e),
            }

            let pause = self.next_pause();
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(node = %self.author, "mining loop stopped");
    }

    /// Base interval plus identity-seeded jitter.
    pub fn next_pause(&mut self) -> Duration {
        let jitter_ms = self.settings.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            self.rng.gen_range(0..=jitter_ms)
        };
        self.settings.interval + Duration::from_millis(jitter)
    }

    /// One propose / mine / commit / gossip cycle.
    pub async fn round(&mut self) -> Result<RoundOutcome> {
        let request = {
            let ledger = self.ledger.lock().await;
            ContentRequest::from_ledger(&ledger, self.failed_positions())
        };

        let proposal = match self.source.propose(&request) {
            Ok(proposal) => proposal,
            Err(e) => {
                warn!("content source failed: {}", e);
                return Ok(RoundOutcome::ContentUnavailable);
            }
        };

        let position = match proposal.position {
            Some(position) => position,
            None => return Ok(RoundOutcome::NoPosition),
        };
        if self.failed.contains(&position) {
            debug!("skipping recently lost position {}", position);
            return Ok(RoundOutcome::RecentlyFailed(position));
        }

        let record = ContentRecord {
            content: proposal.content,
            author: Some(self.author.clone()),
            position: Some(position.clone()),
            previous_position: proposal.previous_position.clone(),
        };
        let payload = Payload::structured(
            record.to_json()?,
            Some(self.author.clone()),
            Some(position.clone()),
            proposal.previous_position,
        );

        let prepared = {
            let ledger = self.ledger.lock().await;
            ledger
                .prepare_block(&payload)
                .map(|block| (block, ledger.difficulty(), ledger.clock()))
        };
        let (mut candidate, difficulty, clock) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return self.reject(position, e),
        };

        let miner = self.miner.clone();
        let searched = tokio::task::spawn_blocking(move || {
            miner
                .mine_timed(&mut candidate, difficulty, clock.as_ref())
                .map(|report| (candidate, report))
        })
        .await?;
        let (block, report) = match searched {
            Ok(found) => found,
            Err(MiningError::Cancelled { attempts }) => {
                info!(attempts, "mining cancelled");
                return Ok(RoundOutcome::Cancelled);
            }
        };

        let committed = self.ledger.lock().await.commit_mined(block, report);
        let block = match committed {
            Ok(block) => block,
            Err(e) => return self.reject(position, e),
        };

        let delivered = self.network.broadcast(&block.to_record()).await;
        info!(index = block.index, peers = delivered, "gossiped mined block");
        self.failed.clear();
        Ok(RoundOutcome::Appended(block))
    }

    fn reject(&mut self, position: Position, error: BlockchainError) -> Result<RoundOutcome> {
        if error.is_position_conflict() {
            warn!("lost position {}: {}", position, error);
            self.remember_failure(position.clone());
            return Ok(RoundOutcome::PositionConflict(position));
        }
        match error {
            BlockchainError::StaleTip { .. } => {
                info!("discarding candidate: {}", error);
                Ok(RoundOutcome::StaleTip)
            }
            other => Err(other.into()),
        }
    }

    fn remember_failure(&mut self, position: Position) {
        if self.settings.failure_memory == 0 {
            return;
        }
        if self.failed.len() == self.settings.failure_memory {
            self.failed.pop_front();
        }
        self.failed.push_back(position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentError, Proposal, VerseNarrator};
    use crate::network::PeerClient;
    use blockbard_chain::Blockchain;
    use blockbard_consensus::SteppingClock;
    use blockbard_tracker::{FrameLimits, TrackerClient, TrackerConfig, TrackerServer};
    use tokio::sync::Mutex;

    async fn network(self_id: &str) -> PeerNetwork {
        let server = TrackerServer::bind(&TrackerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            read_timeout_ms: 500,
        })
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        PeerNetwork::new(
            self_id,
            TrackerClient::new(addr.to_string()),
            PeerClient::new(Duration::from_millis(500), FrameLimits::default()),
        )
    }

    fn ledger(difficulty: usize) -> SharedLedger {
        Arc::new(Mutex::new(Blockchain::with_clock(
            difficulty,
            Arc::new(SteppingClock::new(1_700_000_000.0, 5.0)),
        )))
    }

    fn settings(failure_memory: usize) -> MiningSettings {
        MiningSettings {
            interval: Duration::from_millis(10),
            max_jitter: Duration::from_millis(20),
            failure_memory,
        }
    }

    async fn mining_loop(
        ledger: SharedLedger,
        source: Box<dyn ContentSource>,
        failure_memory: usize,
    ) -> MiningLoop {
        MiningLoop::new(
            ledger,
            network("127.0.0.1:9901").await,
            source,
            Arc::new(AtomicBool::new(false)),
            settings(failure_memory),
        )
    }

    fn fixed(position: Position) -> Box<dyn ContentSource> {
        Box::new(move |_: &ContentRequest| -> std::result::Result<Proposal, ContentError> {
            Ok(Proposal {
                content: "the same line".to_string(),
                position: Some(position.clone()),
                previous_position: None,
            })
        })
    }

    #[tokio::test]
    async fn test_round_appends_content_record() {
        let shared = ledger(1);
        let mut miner = mining_loop(shared.clone(), Box::new(VerseNarrator::new()), 5).await;

        let outcome = miner.round().await.unwrap();
        let block = match outcome {
            RoundOutcome::Appended(block) => block,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(block.index, 1);
        assert_eq!(block.author.as_deref(), Some("127.0.0.1:9901"));
        let record = ContentRecord::from_data(&block.data).unwrap();
        assert_eq!(record.position, Some(Position::verse(1, 1, 1)));

        let chain = shared.lock().await;
        assert_eq!(chain.len(), 2);
        assert!(chain.is_valid());
    }

    #[tokio::test]
    async fn test_lost_position_is_remembered_then_skipped() {
        let shared = ledger(1);
        let mut miner = mining_loop(shared.clone(), fixed(Position::verse(1, 1, 1)), 5).await;

        assert!(matches!(miner.round().await.unwrap(), RoundOutcome::Appended(_)));
        assert_eq!(
            miner.round().await.unwrap(),
            RoundOutcome::PositionConflict(Position::verse(1, 1, 1))
        );
        assert_eq!(miner.failed_positions(), vec![Position::verse(1, 1, 1)]);
        assert_eq!(
            miner.round().await.unwrap(),
            RoundOutcome::RecentlyFailed(Position::verse(1, 1, 1))
        );
        assert_eq!(shared.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_memory_is_bounded() {
        let shared = ledger(1);
        {
            let mut chain = shared.lock().await;
            for verse in 1..=3 {
                chain
                    .add_block(Payload::structured(
                        "taken",
                        None,
                        Some(Position::verse(1, 1, verse)),
                        None,
                    ))
                    .unwrap();
            }
        }

        let mut next = 0u64;
        let source = move |_: &ContentRequest| -> std::result::Result<Proposal, ContentError> {
            next += 1;
            Ok(Proposal {
                content: "late".to_string(),
                position: Some(Position::verse(1, 1, next)),
                previous_position: None,
            })
        };
        let mut miner = mining_loop(shared, Box::new(source), 2).await;

        for _ in 0..3 {
            assert!(matches!(
                miner.round().await.unwrap(),
                RoundOutcome::PositionConflict(_)
            ));
        }
        assert_eq!(
            miner.failed_positions(),
            vec![Position::verse(1, 1, 2), Position::verse(1, 1, 3)]
        );
    }

    #[tokio::test]
    async fn test_success_clears_failures() {
        let shared = ledger(1);
        shared
            .lock()
            .await
            .add_block(Payload::structured("taken", None, Some(Position::verse(1, 1, 1)), None))
            .unwrap();

        let mut miner = mining_loop(shared, Box::new(VerseNarrator::new()), 5).await;
        miner.remember_failure(Position::verse(9, 9, 9));

        assert!(matches!(miner.round().await.unwrap(), RoundOutcome::Appended(_)));
        assert!(miner.failed_positions().is_empty());
    }

    #[tokio::test]
    async fn test_source_without_position_skips() {
        let source = |_: &ContentRequest| -> std::result::Result<Proposal, ContentError> {
            Ok(Proposal {
                content: "unplaced".to_string(),
                position: None,
                previous_position: None,
            })
        };
        let mut miner = mining_loop(ledger(1), Box::new(source), 5).await;
        assert_eq!(miner.round().await.unwrap(), RoundOutcome::NoPosition);
    }

    #[tokio::test]
    async fn test_source_failure_skips() {
        let source = |_: &ContentRequest| -> std::result::Result<Proposal, ContentError> {
            Err(ContentError::Unavailable("generator offline".to_string()))
        };
        let mut miner = mining_loop(ledger(1), Box::new(source), 5).await;
        assert_eq!(miner.round().await.unwrap(), RoundOutcome::ContentUnavailable);
    }

    #[tokio::test]
    async fn test_cancelled_search() {
        let cancel = Arc::new(AtomicBool::new(true));
        let shared = ledger(64);
        let mut miner = MiningLoop::new(
            shared.clone(),
            network("127.0.0.1:9902").await,
            Box::new(VerseNarrator::new()),
            cancel,
            settings(5),
        );

        assert_eq!(miner.round().await.unwrap(), RoundOutcome::Cancelled);
        assert_eq!(shared.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_jitter_is_seeded_by_identity() {
        let mut a = mining_loop(ledger(1), Box::new(VerseNarrator::new()), 5).await;
        let mut b = mining_loop(ledger(1), Box::new(VerseNarrator::new()), 5).await;

        for _ in 0..5 {
            let pause = a.next_pause();
            assert_eq!(pause, b.next_pause());
            assert!(pause >= Duration::from_millis(10));
            assert!(pause <= Duration::from_millis(30));
        }
    }
}
