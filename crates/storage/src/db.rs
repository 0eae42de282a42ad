//! sled handle scoped to the ledger tree.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Db, Tree};
use std::path::Path;
use thiserror::Error;

/// Name of the sled tree holding ledger snapshots.
const LEDGER_TREE: &str = "ledger";

/// Prefix of per-block keys; the index follows as 8 big-endian bytes so
/// keys sort in chain order.
const BLOCK_KEY_PREFIX: &[u8] = b"block:";

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// An open database. Values are bincode-encoded.
pub struct Storage {
    db: Db,
    ledger: Tree,
}

impl Storage {
    /// Open (or create) the database at `path`.
    ///
    /// sled holds an exclusive file lock, so a second process opening the
    /// same directory fails until the first drops its handle.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// Open a database that lives only as long as the handle.
    pub fn open_temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self> {
        let ledger = db.open_tree(LEDGER_TREE)?;
        Ok(Self { db, ledger })
    }

    /// Whether the database already existed on disk before this open.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    pub fn read<V: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<V>> {
        self.ledger
            .get(key)?
            .map(|bytes| bincode::deserialize(&bytes).map_err(StorageError::from))
            .transpose()
    }

    pub fn remove(&self, key: &[u8]) -> Result<()> {
        self.ledger.remove(key)?;
        Ok(())
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.ledger.contains_key(key)?)
    }

    /// Apply `operations` as one atomic batch and flush it to disk.
    pub fn commit(&self, operations: Vec<BatchOp>) -> Result<()> {
        let mut batch = sled::Batch::default();
        for op in operations {
            match op {
                BatchOp::Insert { key, value } => batch.insert(key, value),
                BatchOp::Remove { key } => batch.remove(key),
            }
        }
        self.ledger.apply_batch(batch)?;
        self.ledger.flush()?;
        Ok(())
    }

    /// Key of the block at `index`.
    pub fn block_key(index: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(BLOCK_KEY_PREFIX.len() + 8);
        key.extend_from_slice(BLOCK_KEY_PREFIX);
        key.extend_from_slice(&index.to_be_bytes());
        key
    }
}

/// One write in a [`Storage::commit`] batch.
pub enum BatchOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
}

impl BatchOp {
    /// Insert of a bincode-encoded value.
    pub fn insert<V: Serialize>(key: Vec<u8>, value: &V) -> Result<Self> {
        Ok(Self::Insert {
            key,
            value: bincode::serialize(value)?,
        })
    }

    pub fn remove(key: Vec<u8>) -> Self {
        Self::Remove { key }
    }
}
