//! Bounded-memory retention limits for view slices

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capacities and delays applied by the state reducers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Log lines kept per instance
    pub log_lines: usize,
    /// Gateway request summaries kept (newest first)
    pub gateway_requests: usize,
    /// Error/reroute events kept in the routing timeline
    pub audit_events: usize,
    /// Time a removed request stays flagged `removing` before deletion
    pub removal_grace_ms: u64,
    /// Time a successful request stays visible
    pub success_expiry_ms: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            log_lines: 1000,
            gateway_requests: 500,
            audit_events: 2000,
            removal_grace_ms: 350,
            success_expiry_ms: 5000,
        }
    }
}

impl RetentionConfig {
    pub fn removal_grace(&self) -> Duration {
        Duration::from_millis(self.removal_grace_ms)
    }

    pub fn success_expiry(&self) -> Duration {
        Duration::from_millis(self.success_expiry_ms)
    }
}
