//! Node lifecycle: start, background tasks, shutdown.

use crate::config::NodeConfig;
use crate::content::ContentSource;
use crate::error::Result;
use crate::mining::{MiningLoop, MiningSettings};
use crate::network::{PeerClient, PeerNetwork};
use crate::server::{self, PeerService};
use crate::SharedLedger;
use blockbard_chain::Blockchain;
use blockbard_core::BlockRecord;
use blockbard_storage::{ChainStore, Storage};
use blockbard_tracker::TrackerClient;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A running node.
pub struct Node {
    node_id: String,
    local_addr: SocketAddr,
    ledger: SharedLedger,
    network: PeerNetwork,
    storage: Option<Arc<Storage>>,
    cancel: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    miner_task: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Start a node.
    ///
    /// Loads the last snapshot (when persistence is on), registers with the
    /// tracker, starts the peer listener, syncs to the longest peer chain and
    /// then starts mining if a content source is given. An unreachable
    /// tracker is logged, not fatal.
    pub async fn start(config: NodeConfig, source: Option<Box<dyn ContentSource>>) -> Result<Self> {
        let storage = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let storage = Storage::open(dir)?;
                debug!(path = ?dir, reopened = storage.was_recovered(), "opened ledger database");
                Some(Arc::new(storage))
            }
            None => None,
        };
        let ledger: SharedLedger = Arc::new(Mutex::new(load_or_create(&config, storage.as_deref())?));

        let (listener, local_addr) = server::bind(&config.listen_addr).await?;
        let node_id = config.advertised_id(local_addr);
        let tracker = TrackerClient::new(config.tracker_addr.clone())
            .with_timeouts(config.connect_timeout(), config.frame_limits());
        let network = PeerNetwork::new(
            node_id.clone(),
            tracker,
            PeerClient::new(config.connect_timeout(), config.frame_limits()),
        );

        info!(node = %node_id, tracker = %config.tracker_addr, "starting node");
        if let Err(e) = network.tracker().join(&node_id).await {
            warn!("could not register with tracker {}: {}", config.tracker_addr, e);
        }

        let service = PeerService::new(ledger.clone(), network.clone(), config.frame_limits());
        let mut tasks = vec![tokio::spawn(async move {
            if let Err(e) = service.run(listener).await {
                error!("peer listener stopped: {}", e);
            }
        })];

        network.sync(&ledger).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        if let Some(storage) = &storage {
            tasks.push(tokio::spawn(persist_periodically(
                ledger.clone(),
                Arc::clone(storage),
                config.persist_interval(),
                shutdown_rx.clone(),
            )));
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let miner_task = source.map(|source| {
            let mining = MiningLoop::new(
                ledger.clone(),
                network.clone(),
                source,
                Arc::clone(&cancel),
                MiningSettings {
                    interval: config.mine_interval(),
                    max_jitter: Duration::from_millis(config.max_jitter_ms),
                    failure_memory: config.failure_memory,
                },
            );
            tokio::spawn(mining.run(shutdown_rx.clone()))
        });

        Ok(Self {
            node_id,
            local_addr,
            ledger,
            network,
            storage,
            cancel,
            shutdown_tx,
            miner_task,
            tasks,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared handle on the ledger.
    pub fn ledger(&self) -> SharedLedger {
        Arc::clone(&self.ledger)
    }

    pub fn network(&self) -> &PeerNetwork {
        &self.network
    }

    /// Number of blocks, genesis included.
    pub async fn chain_length(&self) -> usize {
        self.ledger.lock().await.len()
    }

    /// Consistent wire snapshot of the chain.
    pub async fn records(&self) -> Vec<BlockRecord> {
        self.ledger.lock().await.records()
    }

    /// Run a full sync now.
    pub async fn sync(&self) -> bool {
        self.network.sync(&self.ledger).await
    }

    /// Write a snapshot now. A no-op without persistence.
    pub async fn persist(&self) -> Result<()> {
        match &self.storage {
            Some(storage) => persist(&self.ledger, storage).await,
            None => Ok(()),
        }
    }

    /// Stop mining, leave the tracker and write a final snapshot.
    pub async fn shutdown(mut self) -> Result<()> {
        info!(node = %self.node_id, "shutting down");
        self.cancel.store(true, Ordering::SeqCst);
        // Receivers may already be gone; nothing to signal then.
        let _ = self.shutdown_tx.send(true);

        if let Some(task) = self.miner_task.take() {
            if let Err(e) = task.await {
                warn!("mining task ended abnormally: {}", e);
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
            // Wait for the task to drop its handles (the sled lock among them).
            let _ = task.await;
        }

        if let Err(e) = self.network.tracker().leave(&self.node_id).await {
            warn!("could not leave tracker: {}", e);
        }

        self.persist().await
    }
}

fn load_or_create(config: &NodeConfig, storage: Option<&Storage>) -> Result<Blockchain> {
    if let Some(storage) = storage {
        if let Some(ledger) = ChainStore::new(storage).load_ledger()? {
            info!(length = ledger.len(), "resumed ledger from snapshot");
            return Ok(ledger);
        }
    }
    Ok(Blockchain::new(config.initial_difficulty))
}

async fn persist(ledger: &SharedLedger, storage: &Arc<Storage>) -> Result<()> {
    let snapshot = ledger.lock().await.clone();
    let storage = Arc::clone(storage);
    tokio::task::spawn_blocking(move || ChainStore::new(&storage).save_ledger(&snapshot)).await??;
    Ok(())
}

async fn persist_periodically(
    ledger: SharedLedger,
    storage: Arc<Storage>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    // The first tick fires immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        match persist(&ledger, &storage).await {
            Ok(()) => debug!("ledger snapshot written"),
            Err(e) => warn!("could not write ledger snapshot: {}", e),
        }
    }
}
