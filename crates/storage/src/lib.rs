//! Persistent storage layer for blockbard.
//!
//! A node keeps its ledger in memory and periodically writes a snapshot of it
//! to an embedded sled database, so a restarted node resumes from its last
//! saved chain instead of a fresh genesis block.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │   Node (in-memory ledger)    │
//! └──────────────┬───────────────┘
//!                │ save_ledger / load_ledger
//! ┌──────────────▼───────────────┐
//! │  ChainStore   │  Storage     │
//! │  - blocks     │  - sled      │
//! │  - length     │  - bincode   │
//! │  - difficulty │  - batches   │
//! └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use blockbard_chain::Blockchain;
//! use blockbard_storage::{ChainStore, Storage};
//!
//! let storage = Storage::open("./blockbard_data").unwrap();
//! let store = ChainStore::new(&storage);
//!
//! let chain = store
//!     .load_ledger()
//!     .unwrap()
//!     .unwrap_or_else(|| Blockchain::new(2));
//! store.save_ledger(&chain).unwrap();
//! ```

pub mod chain;
pub mod db;

// Re-export commonly used types
pub use chain::ChainStore;
pub use db::{BatchOp, Result, Storage, StorageError};
