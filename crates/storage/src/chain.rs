//! Ledger snapshot storage.

use crate::db::{BatchOp, Result, Storage, StorageError};
use blockbard_chain::Blockchain;
use blockbard_core::Block;

/// Keys for chain metadata.
const CHAIN_LENGTH_KEY: &[u8] = b"chain:length";
const CHAIN_DIFFICULTY_KEY: &[u8] = b"chain:difficulty";

/// Persists whole-ledger snapshots.
///
/// A snapshot is the block sequence keyed by index plus the chain length and
/// the node's difficulty. Fork resolution can replace every block, so each
/// save rewrites the sequence rather than appending to it.
pub struct ChainStore<'a> {
    storage: &'a Storage,
}

impl<'a> ChainStore<'a> {
    /// Create a new ChainStore wrapping the given storage.
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Number of blocks in the stored snapshot (0 if none).
    pub fn length(&self) -> Result<u64> {
        Ok(self.storage.read::<u64>(CHAIN_LENGTH_KEY)?.unwrap_or(0))
    }

    /// Difficulty recorded with the stored snapshot.
    pub fn difficulty(&self) -> Result<Option<usize>> {
        Ok(self
            .storage
            .read::<u64>(CHAIN_DIFFICULTY_KEY)?
            .map(|d| d as usize))
    }

    /// Check if a snapshot has been saved.
    pub fn is_initialized(&self) -> Result<bool> {
        self.storage.contains(CHAIN_LENGTH_KEY)
    }

    /// Get a stored block by index.
    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        self.storage.read(&Storage::block_key(index))
    }

    /// Get stored blocks in a range [from, to].
    pub fn get_blocks_range(&self, from: u64, to: u64) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for index in from..=to {
            match self.get_block(index)? {
                Some(block) => blocks.push(block),
                None => break, // Stop at first missing block
            }
        }
        Ok(blocks)
    }

    /// Replace the stored snapshot with `chain`, atomically.
    pub fn save_ledger(&self, chain: &Blockchain) -> Result<()> {
        let previous_length = self.length()?;
        let blocks = chain.blocks();

        let mut ops = Vec::with_capacity(blocks.len() + 2);
        for (index, block) in blocks.iter().enumerate() {
            ops.push(BatchOp::insert(
                Storage::block_key(index as u64),
                block,
            )?);
        }
        // Drop the tail of a longer snapshot.
        for index in blocks.len() as u64..previous_length {
            ops.push(BatchOp::remove(Storage::block_key(index)));
        }
        ops.push(BatchOp::insert(
            CHAIN_LENGTH_KEY.to_vec(),
            &(blocks.len() as u64),
        )?);
        ops.push(BatchOp::insert(
            CHAIN_DIFFICULTY_KEY.to_vec(),
            &(chain.difficulty() as u64),
        )?);

        self.storage.commit(ops)
    }

    /// Rebuild the ledger from the stored snapshot, if there is one.
    ///
    /// Only gaps are reported as corruption; block contents are not
    /// revalidated, since the recorded difficulty may have moved past the
    /// one some blocks were mined at.
    pub fn load_ledger(&self) -> Result<Option<Blockchain>> {
        let length = self.length()?;
        if length == 0 {
            return Ok(None);
        }

        let blocks = self.get_blocks_range(0, length - 1)?;
        if blocks.len() as u64 != length {
            return Err(StorageError::Corrupt(format!(
                "expected {} blocks, found {}",
                length,
                blocks.len()
            )));
        }

        let difficulty = self.difficulty()?.unwrap_or(1);
        Blockchain::from_blocks(blocks, difficulty)
            .map(Some)
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockbard_consensus::SteppingClock;
    use std::sync::Arc;

    fn ledger(blocks: usize) -> Blockchain {
        let mut chain =
            Blockchain::with_clock(1, Arc::new(SteppingClock::new(1_700_000_000.0, 5.0)));
        for i in 0..blocks {
            chain.add_block(format!("block {i}")).unwrap();
        }
        chain
    }

    #[test]
    fn test_empty_store_loads_nothing() {
        let storage = Storage::open_temporary().unwrap();
        let store = ChainStore::new(&storage);

        assert!(!store.is_initialized().unwrap());
        assert!(store.load_ledger().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let storage = Storage::open_temporary().unwrap();
        let store = ChainStore::new(&storage);
        let chain = ledger(3);

        store.save_ledger(&chain).unwrap();
        let loaded = store.load_ledger().unwrap().unwrap();

        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.records(), chain.records());
        assert_eq!(loaded.difficulty(), chain.difficulty());
        assert!(loaded.is_valid());
    }

    #[test]
    fn test_shorter_snapshot_replaces_longer() {
        let storage = Storage::open_temporary().unwrap();
        let store = ChainStore::new(&storage);

        store.save_ledger(&ledger(4)).unwrap();
        let short = ledger(1);
        store.save_ledger(&short).unwrap();

        assert_eq!(store.length().unwrap(), 2);
        assert!(store.get_block(3).unwrap().is_none());
        assert_eq!(store.load_ledger().unwrap().unwrap().records(), short.records());
    }

    #[test]
    fn test_missing_block_is_corrupt() {
        let storage = Storage::open_temporary().unwrap();
        let store = ChainStore::new(&storage);
        store.save_ledger(&ledger(2)).unwrap();

        storage.remove(&Storage::block_key(1)).unwrap();
        assert!(matches!(
            store.load_ledger(),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_load_keeps_blocks_as_stored() {
        let storage = Storage::open_temporary().unwrap();
        let store = ChainStore::new(&storage);
        let chain = ledger(2);
        store.save_ledger(&chain).unwrap();

        let mut altered = chain.blocks()[1].clone();
        altered.data = "edited on disk".to_string();
        storage
            .commit(vec![BatchOp::insert(Storage::block_key(1), &altered).unwrap()])
            .unwrap();

        let loaded = store.load_ledger().unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get_block(1).unwrap().data, "edited on disk");
        assert!(!loaded.is_valid());
    }
}
