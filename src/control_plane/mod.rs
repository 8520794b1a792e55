//! Control-plane REST collaborators.
//!
//! The event feed only carries changes. History (log backfill, gateway
//! statistics, past routing errors) and point-in-time snapshots come from the
//! control plane's REST API through [`ControlPlaneApi`].

mod client;
mod error;
mod types;

pub use client::ControlPlaneClient;
pub use error::ControlPlaneError;
pub use types::{GatewayQuery, GatewayRequestPage, GatewayStats, TimeRange};

use crate::events::{HostStatus, InstanceRuntimeState, LogLine, RoutingEvent, RoutingEventKind};
use crate::state::FleetState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Read-only REST surface of the control plane.
///
/// Object-safe; used as `Arc<dyn ControlPlaneApi>` so tests can substitute an
/// in-memory implementation.
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    async fn fetch_hosts(&self) -> Result<Vec<HostStatus>, ControlPlaneError>;

    /// Historical log lines with sequence numbers, any order.
    async fn fetch_instance_logs(
        &self,
        host_id: &str,
        instance_id: &str,
    ) -> Result<Vec<LogLine>, ControlPlaneError>;

    async fn fetch_instance_state(
        &self,
        host_id: &str,
        instance_id: &str,
    ) -> Result<InstanceRuntimeState, ControlPlaneError>;

    async fn fetch_gateway_stats(&self, query: &GatewayQuery)
        -> Result<GatewayStats, ControlPlaneError>;

    async fn fetch_gateway_requests(
        &self,
        query: &GatewayQuery,
    ) -> Result<GatewayRequestPage, ControlPlaneError>;

    /// Past `request_error` / `request_reroute` events for audit backfill.
    async fn fetch_recent_gateway_events(
        &self,
        range: &TimeRange,
        limit: u32,
        kinds: &[RoutingEventKind],
    ) -> Result<Vec<RoutingEvent>, ControlPlaneError>;
}

/// Where consumers read host and instance state from.
///
/// Chosen once at construction: either the live slices maintained by the
/// event stream, or REST polling at a fixed interval.
#[derive(Clone)]
pub enum StateSource {
    Stream(Arc<FleetState>),
    Poll {
        api: Arc<dyn ControlPlaneApi>,
        interval: Duration,
    },
}

impl StateSource {
    pub fn is_live(&self) -> bool {
        matches!(self, StateSource::Stream(_))
    }

    /// Refresh period for poll-backed sources.
    pub fn poll_interval(&self) -> Option<Duration> {
        match self {
            StateSource::Stream(_) => None,
            StateSource::Poll { interval, .. } => Some(*interval),
        }
    }

    pub async fn hosts(&self) -> Result<HashMap<String, HostStatus>, ControlPlaneError> {
        match self {
            StateSource::Stream(state) => Ok(state.hosts()),
            StateSource::Poll { api, .. } => Ok(api
                .fetch_hosts()
                .await?
                .into_iter()
                .filter(|h| !h.host_id.is_empty())
                .map(|h| (h.host_id.clone(), h))
                .collect()),
        }
    }

    pub async fn instance_state(
        &self,
        host_id: &str,
        instance_id: &str,
    ) -> Result<Option<InstanceRuntimeState>, ControlPlaneError> {
        match self {
            StateSource::Stream(state) => Ok(state.instance_state(host_id, instance_id)),
            StateSource::Poll { api, .. } => api
                .fetch_instance_state(host_id, instance_id)
                .await
                .map(Some),
        }
    }
}
