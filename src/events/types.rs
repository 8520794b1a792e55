//! Payload types carried inside feed envelopes

use super::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite key of an inference instance on a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub host_id: String,
    pub instance_id: String,
}

impl InstanceKey {
    pub fn new(host_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host_id, self.instance_id)
    }
}

/// Reachability of a host as reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Online,
    #[default]
    Offline,
    Error,
    #[serde(other)]
    Unknown,
}

/// Memory utilization snapshot for a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub used: f64,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub percent: f64,
    /// Memory pool the numbers refer to (e.g. "vram", "unified", "system")
    #[serde(default)]
    pub kind: Option<String>,
}

/// One host entry of the host status slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HostStatus {
    #[serde(default, alias = "id")]
    pub host_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: HostState,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub memory: Option<MemorySnapshot>,
    #[serde(default, deserialize_with = "super::lenient")]
    pub last_seen: Option<Timestamp>,
}

/// Body of a `host_health` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct HostHealth {
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub memory: Option<MemorySnapshot>,
}

/// What an instance is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstancePhase {
    #[default]
    Idle,
    Prefill,
    Generating,
    #[serde(other)]
    Unknown,
}

/// Complete runtime snapshot of one instance.
///
/// Each `instance_state` event carries the whole value; the slice replaces
/// the previous snapshot rather than merging fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InstanceRuntimeState {
    #[serde(default)]
    pub busy: bool,
    #[serde(default)]
    pub phase: InstancePhase,
    /// Prompt processing progress in `0.0..=1.0`
    #[serde(default)]
    pub prefill_progress: Option<f64>,
    #[serde(default)]
    pub active_slots: u32,
    #[serde(default)]
    pub slot_id: Option<i64>,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub generated_tokens: Option<u64>,
    /// Decode throughput in tokens per second
    #[serde(default)]
    pub tokens_per_second: Option<f64>,
    #[serde(default)]
    pub checkpoint_index: Option<u32>,
    #[serde(default)]
    pub checkpoint_total: Option<u32>,
    #[serde(default, deserialize_with = "super::lenient")]
    pub updated_at: Option<Timestamp>,
}

impl InstanceRuntimeState {
    /// Prefill progress clamped to `0.0..=1.0`, if reported.
    pub fn prefill_fraction(&self) -> Option<f64> {
        self.prefill_progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 1.0))
    }
}

/// One instance log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// Monotonic per-instance sequence number
    pub seq: u64,
    #[serde(default, deserialize_with = "super::lenient")]
    pub timestamp: Option<Timestamp>,
    #[serde(alias = "text", alias = "message")]
    pub line: String,
}

/// Fields carried by the `request_*` lifecycle events.
///
/// Every event kind fills a different subset; absent fields never erase
/// values recorded by an earlier event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RequestPayload {
    pub request_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub resolved_model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "super::lenient")]
    pub timestamp: Option<Timestamp>,
}

/// Routing events retained in the audit ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingEventKind {
    RequestError,
    RequestReroute,
}

impl RoutingEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingEventKind::RequestError => "request_error",
            RoutingEventKind::RequestReroute => "request_reroute",
        }
    }
}

/// Error or reroute event kept for the routing timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEvent {
    #[serde(rename = "type")]
    pub kind: RoutingEventKind,
    #[serde(default, deserialize_with = "super::lenient")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RoutingEvent {
    pub fn request_id(&self) -> Option<&str> {
        self.data.get("request_id").and_then(|v| v.as_str())
    }
}

/// Final outcome of a gateway request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatewayOutcome {
    #[default]
    Success,
    Error,
    Missed,
    #[serde(other)]
    Unknown,
}

/// Completed gateway request as summarized by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GatewayRequestSummary {
    #[serde(default)]
    pub request_id: String,
    #[serde(default, deserialize_with = "super::lenient")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub resolved_model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub status: GatewayOutcome,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
}
