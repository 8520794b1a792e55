//! Event feed connection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Liveness probing and reconnection timing for the event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Feed path appended to the control-plane URL
    pub path: String,
    /// Interval between `ping` heartbeats on an open connection
    pub keepalive_interval_ms: u64,
    /// Fixed delay before reconnecting after any close
    pub reconnect_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            keepalive_interval_ms: 25_000,
            reconnect_delay_ms: 5_000,
        }
    }
}

impl StreamConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
