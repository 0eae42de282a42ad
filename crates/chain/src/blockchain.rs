//! The ledger: an ordered sequence of blocks plus the node's current difficulty.
//!
//! Local appends go through [`Blockchain::add_block`], or through the
//! split [`Blockchain::prepare_block`] / [`Blockchain::commit_mined`] pair when
//! the nonce search has to run without holding the ledger lock. Peer blocks go
//! through [`Blockchain::add_block_from_record`], and whole peer chains through
//! [`Blockchain::resolve_conflicts`].

use blockbard_consensus::{
    ChainValidator, Clock, DifficultyPolicy, Miner, MiningError, MiningReport, SystemClock,
    ValidationError,
};
use blockbard_core::{Block, BlockParts, BlockRecord, CoreError, Payload};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("mining error: {0}")]
    Mining(#[from] MiningError),

    #[error("record error: {0}")]
    Record(#[from] CoreError),

    #[error("chain tip moved while mining (expected parent {expected}, tip is {actual})")]
    StaleTip { expected: String, actual: String },
}

impl BlockchainError {
    /// Whether this is a lost race for a structural position.
    pub fn is_position_conflict(&self) -> bool {
        matches!(
            self,
            Self::Validation(
                ValidationError::DuplicatePosition(_) | ValidationError::DanglingReference(_)
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// The ledger.
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// Blocks in order; index 0 is genesis.
    blocks: Vec<Block>,
    /// Required leading zero hex digits for the next sealed block.
    difficulty: usize,
    /// Difficulty adaptation rules.
    policy: DifficultyPolicy,
    /// Time source for timestamps and mining measurements.
    clock: Arc<dyn Clock>,
    /// Nonce searcher used by [`Blockchain::add_block`].
    miner: Miner,
}

impl Blockchain {
    /// Create a new ledger with a fresh genesis block.
    pub fn new(difficulty: usize) -> Self {
        Self::with_clock(difficulty, Arc::new(SystemClock))
    }

    /// Create a new ledger reading time from `clock`.
    pub fn with_clock(difficulty: usize, clock: Arc<dyn Clock>) -> Self {
        let genesis = Block::genesis(clock.now());
        Self {
            blocks: vec![genesis],
            difficulty,
            policy: DifficultyPolicy::default(),
            clock,
            miner: Miner::default(),
        }
    }

    /// Rebuild a ledger from previously stored blocks.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: usize) -> Result<Self> {
        if blocks.is_empty() {
            return Err(ValidationError::EmptyChain.into());
        }
        Ok(Self {
            blocks,
            difficulty,
            policy: DifficultyPolicy::default(),
            clock: Arc::new(SystemClock),
            miner: Miner::default(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false for a constructed ledger; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Get the latest block.
    pub fn latest_block(&self) -> &Block {
        // `blocks` is never empty: every constructor installs at least genesis
        // and `resolve_conflicts` only adopts validated, non-empty chains.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Get a block by index.
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.iter().find(|block| block.index == index)
    }

    /// Get a block by hash.
    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.hash == hash)
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn set_difficulty(&mut self, difficulty: usize) {
        self.difficulty = difficulty;
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Every position hash recorded on the chain, in order.
    pub fn position_hashes(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|block| block.position_hash.as_deref())
            .collect()
    }

    pub fn contains_position(&self, position_hash: &str) -> bool {
        ChainValidator::contains_position(&self.blocks, position_hash)
    }

    /// Wire snapshot of the whole chain.
    pub fn records(&self) -> Vec<BlockRecord> {
        self.blocks.iter().map(BlockRecord::from).collect()
    }

    /// The payload strings of every block, oldest first.
    pub fn payloads(&self) -> Vec<String> {
        self.blocks.iter().map(|block| block.data.clone()).collect()
    }

    // =========================================================================
    // Local Appends
    // =========================================================================

    /// Check a payload's positions and build the next, unsealed block.
    pub fn prepare_block(&self, payload: &Payload) -> Result<Block> {
        let position_hash = payload.position().map(|p| p.hash());
        let previous_position_hash = payload.previous_position().map(|p| p.hash());

        ChainValidator::validate_position(
            &self.blocks,
            position_hash.as_deref(),
            previous_position_hash.as_deref(),
        )?;

        let latest = self.latest_block();
        Ok(Block::new(BlockParts {
            index: latest.index + 1,
            timestamp: self.clock.now(),
            data: payload.data().to_string(),
            author: payload.author().map(str::to_string),
            previous_hash: latest.hash.clone(),
            nonce: 0,
            position_hash,
            previous_position_hash,
        }))
    }

    /// Search for a nonce at the current difficulty, then adapt difficulty.
    ///
    /// This blocks the caller for the whole search.
    pub fn mine(&mut self, block: &mut Block) -> Result<MiningReport> {
        let report = self
            .miner
            .mine_timed(block, self.difficulty, self.clock.as_ref())?;
        self.adapt_difficulty(&report);
        Ok(report)
    }

    /// Append a payload: check positions, mine, append.
    pub fn add_block(&mut self, payload: impl Into<Payload>) -> Result<Block> {
        let payload = payload.into();
        let mut block = self.prepare_block(&payload)?;
        self.mine(&mut block)?;
        info!(index = block.index, hash = %block.hash, "mined block");
        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Append a block that was mined outside the ledger lock.
    ///
    /// Fails with [`BlockchainError::StaleTip`] if another block landed while
    /// the search ran, and re-checks the position rules against the chain as
    /// it is now.
    pub fn commit_mined(&mut self, block: Block, report: MiningReport) -> Result<Block> {
        let tip = self.latest_block();
        if block.previous_hash != tip.hash || block.index != tip.index + 1 {
            return Err(BlockchainError::StaleTip {
                expected: block.previous_hash,
                actual: tip.hash.clone(),
            });
        }

        ChainValidator::validate_seal(&block, report.difficulty)?;
        ChainValidator::validate_position(
            &self.blocks,
            block.position_hash.as_deref(),
            block.previous_position_hash.as_deref(),
        )?;

        self.adapt_difficulty(&report);
        info!(index = block.index, hash = %block.hash, "mined block");
        self.blocks.push(block.clone());
        Ok(block)
    }

    fn adapt_difficulty(&mut self, report: &MiningReport) {
        let next = self.policy.next_difficulty(self.difficulty, report.elapsed());
        if next != self.difficulty {
            debug!(
                from = self.difficulty,
                to = next,
                elapsed = report.elapsed(),
                "difficulty adjusted"
            );
        }
        self.difficulty = next;
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Full validation scan, with the reason for the first failure.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        ChainValidator::validate_chain(&self.blocks, self.difficulty)
    }

    /// Check the whole ledger against the current difficulty.
    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                debug!("ledger invalid: {}", e);
                false
            }
        }
    }

    /// Check an arbitrary candidate chain against the current difficulty.
    pub fn is_valid_chain(&self, candidate: &[Block]) -> bool {
        match ChainValidator::validate_chain(candidate, self.difficulty) {
            Ok(()) => true,
            Err(e) => {
                debug!("candidate chain invalid: {}", e);
                false
            }
        }
    }

    // =========================================================================
    // Peer Blocks
    // =========================================================================

    /// Validate and append a sealed block received from a peer.
    ///
    /// A fresh ledger (genesis only) receiving block #1 first adopts the
    /// sender's genesis hash, since every node stamps its own genesis with
    /// local time. Expected rejections return `false`.
    pub fn add_block_from_record(&mut self, record: BlockRecord) -> bool {
        let block = Block::from(record);

        if block.index == 1 && self.blocks.len() == 1 {
            info!("adopting remote genesis hash {}", block.previous_hash);
            self.blocks[0].hash = block.previous_hash.clone();
        }

        if let Err(e) = ChainValidator::validate_successor(&self.blocks, &block, self.difficulty)
        {
            warn!(index = block.index, "rejected peer block: {}", e);
            return false;
        }

        info!(index = block.index, hash = %block.hash, "appended peer block");
        self.blocks.push(block);
        true
    }

    /// Parse a JSON block record and append it.
    ///
    /// Malformed JSON is an error; a well-formed but unacceptable block is
    /// `Ok(false)`.
    pub fn add_block_from_json(&mut self, json: &str) -> Result<bool> {
        let record = BlockRecord::from_json(json)?;
        Ok(self.add_block_from_record(record))
    }

    // =========================================================================
    // Fork Resolution
    // =========================================================================

    /// Adopt the longest valid candidate that is strictly longer than ours.
    ///
    /// The whole sequence is replaced at once, genesis included. Returns
    /// `true` if the chain was replaced.
    pub fn resolve_conflicts(&mut self, candidates: Vec<Vec<BlockRecord>>) -> bool {
        let mut best: Option<Vec<Block>> = None;
        let mut best_len = self.blocks.len();

        for records in candidates {
            if records.len() <= best_len {
                continue;
            }
            let candidate: Vec<Block> = records.into_iter().map(Block::from).collect();
            if self.is_valid_chain(&candidate) {
                best_len = candidate.len();
                best = Some(candidate);
            } else {
                warn!(length = candidate.len(), "ignoring invalid candidate chain");
            }
        }

        match best {
            Some(chain) => {
                info!(
                    from = self.blocks.len(),
                    to = chain.len(),
                    "replacing local chain with longer peer chain"
                );
                self.blocks = chain;
                true
            }
            None => false,
        }
    }
}
