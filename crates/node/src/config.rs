//! Node configuration.

use crate::error::Result;
use blockbard_tracker::FrameLimits;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a [`Node`](crate::Node).
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the peer listener binds.
    pub listen_addr: String,
    /// Identifier advertised to the registry and peers. Defaults to the
    /// bound address.
    pub node_id: Option<String>,
    /// Registry address.
    pub tracker_addr: String,
    /// Difficulty of a ledger that starts from genesis.
    pub initial_difficulty: usize,
    /// Connect timeout for every outbound connection.
    pub connect_timeout_ms: u64,
    /// Time allowed for one inbound message to arrive.
    pub read_timeout_ms: u64,
    /// Base pause between mining rounds.
    pub mine_interval_ms: u64,
    /// Upper bound of the per-round jitter added to the pause.
    pub max_jitter_ms: u64,
    /// How many recently lost positions the mining loop avoids.
    pub failure_memory: usize,
    /// Snapshot directory. Persistence is off when unset.
    pub data_dir: Option<PathBuf>,
    /// Seconds between ledger snapshots.
    pub persist_interval_secs: u64,
    /// Largest accepted inbound message.
    pub max_frame_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9000".to_string(),
            node_id: None,
            tracker_addr: "127.0.0.1:8000".to_string(),
            initial_difficulty: 2,
            connect_timeout_ms: 2000,
            read_timeout_ms: 5000,
            mine_interval_ms: 5000,
            max_jitter_ms: 2000,
            failure_memory: 5,
            data_dir: None,
            persist_interval_secs: 30,
            max_frame_bytes: 64 * 1024 * 1024,
        }
    }
}

impl NodeConfig {
    /// Load a JSON config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn mine_interval(&self) -> Duration {
        Duration::from_millis(self.mine_interval_ms)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs.max(1))
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_frame_bytes: self.max_frame_bytes,
            read_timeout: self.read_timeout(),
        }
    }

    /// The identifier peers should use to reach a listener bound at `bound`.
    ///
    /// A wildcard bind address is advertised as loopback.
    pub fn advertised_id(&self, bound: SocketAddr) -> String {
        if let Some(id) = &self.node_id {
            return id.clone();
        }
        let mut addr = bound;
        if addr.ip().is_unspecified() {
            addr.set_ip(std::net::Ipv4Addr::LOCALHOST.into());
        }
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.initial_difficulty, 2);
        assert_eq!(config.failure_memory, 5);
        assert_eq!(config.frame_limits().max_frame_bytes, 64 * 1024 * 1024);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"listen_addr":"127.0.0.1:9100","initial_difficulty":3,"data_dir":"/tmp/bb"}}"#
        )
        .unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9100");
        assert_eq!(config.initial_difficulty, 3);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/bb")));
        assert_eq!(config.tracker_addr, "127.0.0.1:8000");
    }

    #[test]
    fn test_from_file_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(NodeConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_advertised_id() {
        let config = NodeConfig::default();
        let bound: SocketAddr = "0.0.0.0:9123".parse().unwrap();
        assert_eq!(config.advertised_id(bound), "127.0.0.1:9123");

        let named = NodeConfig {
            node_id: Some("bard-a:9000".to_string()),
            ..NodeConfig::default()
        };
        assert_eq!(named.advertised_id(bound), "bard-a:9000");
    }
}
