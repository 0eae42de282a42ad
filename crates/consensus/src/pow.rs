//! Proof of Work (PoW) mining and difficulty adaptation.
//!
//! A block is sealed once its hex hash starts with `difficulty` zero digits.
//! The nonce search is brute force; it is bounded only by an optional
//! cancellation flag so a node can shut down in the middle of a search.
//!
//! Difficulty adapts per node after each successful search, from the elapsed
//! time between two explicit clock readings. Nodes never agree on a shared
//! difficulty, so a block mined under one node's difficulty is checked
//! against whatever difficulty the validating node holds at that moment.

use blockbard_core::Block;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during mining.
#[derive(Debug, Error)]
pub enum MiningError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
}

pub type Result<T> = std::result::Result<T, MiningError>;

/// Source of wall time, in seconds since the Unix epoch.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> f64;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Block::current_timestamp()
    }
}

/// A deterministic clock that advances by a fixed step on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    start: f64,
    step: f64,
    ticks: AtomicU64,
}

impl SteppingClock {
    pub fn new(start: f64, step: f64) -> Self {
        Self {
            start,
            step,
            ticks: AtomicU64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> f64 {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + self.step * tick as f64
    }
}

/// Difficulty adaptation rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyPolicy {
    /// Target block time in seconds.
    pub target_block_time: f64,
    /// Difficulty never drops below this.
    pub min_difficulty: usize,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        Self {
            target_block_time: 5.0,
            min_difficulty: 1,
        }
    }
}

impl DifficultyPolicy {
    /// Difficulty for the next block after a search that took `elapsed` seconds.
    ///
    /// Faster than half the target raises difficulty by one; slower than twice
    /// the target lowers it by one, never below the minimum.
    pub fn next_difficulty(&self, current: usize, elapsed: f64) -> usize {
        if elapsed < self.target_block_time * 0.5 {
            current + 1
        } else if elapsed > self.target_block_time * 2.0 && current > self.min_difficulty {
            current - 1
        } else {
            current
        }
    }
}

/// Outcome of a successful nonce search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiningReport {
    /// Clock reading before the search.
    pub started: f64,
    /// Clock reading after the search.
    pub finished: f64,
    /// Number of nonces tried beyond the initial one.
    pub attempts: u64,
    /// Difficulty the block was sealed against.
    pub difficulty: usize,
}

impl MiningReport {
    pub fn elapsed(&self) -> f64 {
        self.finished - self.started
    }
}

/// Nonce searcher.
#[derive(Debug, Clone)]
pub struct Miner {
    cancel: Arc<AtomicBool>,
    check_interval: u64,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)))
    }
}

impl Miner {
    /// How many nonces are tried between two looks at the cancellation flag.
    pub const DEFAULT_CHECK_INTERVAL: u64 = 10_000;

    /// Create a miner observing the given cancellation flag.
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            cancel,
            check_interval: Self::DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Override the cancellation check interval.
    pub fn with_check_interval(mut self, interval: u64) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    /// The shared cancellation flag.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Ask any in-flight search to stop.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Increment the nonce until the hash meets `difficulty`.
    ///
    /// Returns the number of nonces tried.
    pub fn mine(&self, block: &mut Block, difficulty: usize) -> Result<u64> {
        let mut attempts = 0u64;
        while !block.meets_difficulty(difficulty) {
            block.nonce += 1;
            block.hash = block.compute_hash();
            attempts += 1;
            if attempts % self.check_interval == 0 && self.is_cancelled() {
                return Err(MiningError::Cancelled { attempts });
            }
        }
        Ok(attempts)
    }

    /// Mine and record start/end readings from `clock`.
    pub fn mine_timed(
        &self,
        block: &mut Block,
        difficulty: usize,
        clock: &dyn Clock,
    ) -> Result<MiningReport> {
        let started = clock.now();
        let attempts = self.mine(block, difficulty)?;
        let finished = clock.now();
        Ok(MiningReport {
            started,
            finished,
            attempts,
            difficulty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockbard_core::BlockParts;

    fn candidate() -> Block {
        Block::new(BlockParts {
            index: 1,
            timestamp: 1_700_000_000.0,
            data: "candidate".to_string(),
            author: None,
            previous_hash: "0".repeat(64),
            nonce: 0,
            position_hash: None,
            previous_position_hash: None,
        })
    }

    #[test]
    fn test_mine_meets_difficulty() {
        let mut block = candidate();
        Miner::default().mine(&mut block, 2).unwrap();

        assert!(block.hash.starts_with("00"));
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_mine_zero_difficulty_is_noop() {
        let mut block = candidate();
        let attempts = Miner::default().mine(&mut block, 0).unwrap();
        assert_eq!(attempts, 0);
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_cancelled_search_stops() {
        let miner = Miner::default().with_check_interval(1);
        miner.cancel();

        let mut block = candidate();
        // 64 zero digits is unreachable; only cancellation can end this search.
        let result = miner.mine(&mut block, 64);
        assert!(matches!(result, Err(MiningError::Cancelled { attempts: 1 })));
    }

    #[test]
    fn test_mine_timed_reports_elapsed() {
        let clock = SteppingClock::new(100.0, 3.0);
        let mut block = candidate();
        let report = Miner::default().mine_timed(&mut block, 1, &clock).unwrap();

        assert_eq!(report.started, 100.0);
        assert_eq!(report.finished, 103.0);
        assert_eq!(report.elapsed(), 3.0);
        assert_eq!(report.difficulty, 1);
    }

    #[test]
    fn test_difficulty_rises_when_fast() {
        let policy = DifficultyPolicy::default();
        assert_eq!(policy.next_difficulty(2, 0.1), 3);
        assert_eq!(policy.next_difficulty(2, 2.49), 3);
    }

    #[test]
    fn test_difficulty_falls_when_slow() {
        let policy = DifficultyPolicy::default();
        assert_eq!(policy.next_difficulty(3, 10.5), 2);
        assert_eq!(policy.next_difficulty(1, 60.0), 1);
    }

    #[test]
    fn test_difficulty_steady_in_band() {
        let policy = DifficultyPolicy::default();
        assert_eq!(policy.next_difficulty(2, 2.5), 2);
        assert_eq!(policy.next_difficulty(2, 5.0), 2);
        assert_eq!(policy.next_difficulty(2, 10.0), 2);
    }

    #[test]
    fn test_system_clock_is_recent() {
        assert!(SystemClock.now() > 1_600_000_000.0);
    }
}
