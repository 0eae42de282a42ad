//! Registry service configuration.

use crate::wire::FrameLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest request the registry reads; commands are a single short line.
const MAX_COMMAND_BYTES: usize = 64 * 1024;

/// Configuration for [`TrackerServer`](crate::TrackerServer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Address the registry listens on.
    pub listen_addr: String,
    /// Time allowed for a client to send its command.
    pub read_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            read_timeout_ms: 5000,
        }
    }
}

impl TrackerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_frame_bytes: MAX_COMMAND_BYTES,
            read_timeout: self.read_timeout(),
        }
    }
}
