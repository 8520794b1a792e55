//! Fleet view state.
//!
//! [`FleetState`] owns every slice the event feed folds into and is the only
//! way to mutate them. It is built once, wrapped in an `Arc` and handed to the
//! stream task and to every consumer.

mod audit;
mod gateway;
mod hosts;
mod instances;
mod logs;
mod requests;
#[cfg(test)]
mod tests;

pub use audit::AuditSlice;
pub use gateway::GatewaySlice;
pub use hosts::HostSlice;
pub use instances::InstanceSlice;
pub use logs::LogSlice;
pub use requests::{RequestSlice, RequestState, RequestStatus};

use crate::config::RetentionConfig;
use crate::events::{
    GatewayRequestSummary, HostStatus, InstanceKey, InstanceRuntimeState, LogLine, RoutingEvent,
    StreamEvent,
};
use crate::filter::{FilterController, FilterPatch, GatewayFilter};
use crate::stream::FeedSender;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// Change notification published after every slice mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceUpdate {
    Connection(bool),
    /// Bulk host replacement
    Hosts,
    Host(String),
    Instance(InstanceKey),
    Logs(InstanceKey),
    Request(String),
    RequestRemoved(String),
    Gateway,
    Audit,
    Filter,
}

/// Every slice of the fleet view plus the filter controller.
pub struct FleetState {
    hosts: HostSlice,
    instances: InstanceSlice,
    logs: LogSlice,
    requests: Arc<RequestSlice>,
    gateway: GatewaySlice,
    audit: AuditSlice,
    filter: FilterController,
    feed: FeedSender,
    connected: AtomicBool,
    updates: broadcast::Sender<SliceUpdate>,
}

impl FleetState {
    pub fn new(retention: &RetentionConfig) -> Arc<Self> {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let feed = FeedSender::default();
        Arc::new(Self {
            hosts: HostSlice::new(),
            instances: InstanceSlice::new(),
            logs: LogSlice::new(retention.log_lines),
            requests: RequestSlice::new(retention, updates.clone()),
            gateway: GatewaySlice::new(retention.gateway_requests),
            audit: AuditSlice::new(retention.audit_events),
            filter: FilterController::new(feed.clone()),
            feed,
            connected: AtomicBool::new(false),
            updates,
        })
    }

    /// Fold one decoded event into its slice.
    ///
    /// Returns the update that was published, or `None` for events that carry
    /// no state (keepalives, unknown discriminants, health for unknown hosts).
    pub fn apply(&self, event: StreamEvent) -> Option<SliceUpdate> {
        let update = match event {
            StreamEvent::InitialStatus(hosts) => {
                tracing::debug!(count = hosts.len(), "Replacing host list");
                self.hosts.replace_all(hosts);
                SliceUpdate::Hosts
            }
            StreamEvent::HostStatus(host) => {
                let id = host.host_id.clone();
                self.hosts.upsert(host);
                SliceUpdate::Host(id)
            }
            StreamEvent::HostHealth { host_id, memory } => {
                if !self.hosts.patch_memory(&host_id, memory) {
                    tracing::debug!(host_id = %host_id, "Health for unknown host ignored");
                    return None;
                }
                SliceUpdate::Host(host_id)
            }
            StreamEvent::Log { key, line } => {
                self.logs.append(key.clone(), line);
                SliceUpdate::Logs(key)
            }
            StreamEvent::InstanceState { key, state } => {
                self.instances.replace(key.clone(), state);
                SliceUpdate::Instance(key)
            }
            StreamEvent::RequestStart(payload) => {
                self.requests.start(&payload);
                SliceUpdate::Request(payload.request_id)
            }
            StreamEvent::RequestRouted(payload) => {
                self.requests.routed(&payload);
                SliceUpdate::Request(payload.request_id)
            }
            StreamEvent::RequestSuccess(payload) => {
                self.requests.succeeded(&payload);
                SliceUpdate::Request(payload.request_id)
            }
            StreamEvent::RequestError(payload, audit) => {
                self.requests.failed(&payload);
                self.audit.push(audit);
                self.publish(SliceUpdate::Audit);
                SliceUpdate::Request(payload.request_id)
            }
            StreamEvent::RequestReroute(event) => {
                self.audit.push(event);
                SliceUpdate::Audit
            }
            StreamEvent::GatewayRequest(summary) => {
                self.gateway.push(summary);
                SliceUpdate::Gateway
            }
            StreamEvent::FilterStatus(filter) => {
                self.filter.apply_status(filter);
                SliceUpdate::Filter
            }
            StreamEvent::Keepalive => return None,
            StreamEvent::Unknown(kind) => {
                tracing::debug!(kind = %kind, "Ignoring unknown event type");
                return None;
            }
        };

        self.publish(update.clone());
        Some(update)
    }

    fn publish(&self, update: SliceUpdate) {
        // No receivers is fine
        let _ = self.updates.send(update);
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SliceUpdate> {
        self.updates.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Publish the feed liveness flag. Only transitions are announced.
    pub fn set_connected(&self, connected: bool) {
        if self.connected.swap(connected, Ordering::SeqCst) != connected {
            self.publish(SliceUpdate::Connection(connected));
        }
    }

    /// Outbound half of the feed connection.
    pub fn feed_sender(&self) -> FeedSender {
        self.feed.clone()
    }

    pub fn hosts(&self) -> HashMap<String, HostStatus> {
        self.hosts.snapshot()
    }

    pub fn host(&self, host_id: &str) -> Option<HostStatus> {
        self.hosts.get(host_id)
    }

    pub fn requests(&self) -> Vec<RequestState> {
        self.requests.snapshot()
    }

    pub fn request(&self, request_id: &str) -> Option<RequestState> {
        self.requests.get(request_id)
    }

    pub fn instance_states(&self) -> Vec<(InstanceKey, InstanceRuntimeState)> {
        self.instances.snapshot()
    }

    pub fn instance_state(&self, host_id: &str, instance_id: &str) -> Option<InstanceRuntimeState> {
        self.instances.get(&InstanceKey::new(host_id, instance_id))
    }

    /// Retained live log lines for one instance, oldest first.
    pub fn instance_logs(&self, host_id: &str, instance_id: &str) -> Vec<LogLine> {
        self.logs.lines(&InstanceKey::new(host_id, instance_id))
    }

    /// Instances that have live log lines retained.
    pub fn logged_instances(&self) -> Vec<InstanceKey> {
        self.logs.keys()
    }

    /// Gateway summaries, newest first.
    pub fn gateway_requests(&self) -> Vec<GatewayRequestSummary> {
        self.gateway.snapshot()
    }

    /// Routing audit events, oldest first.
    pub fn audit_events(&self) -> Vec<RoutingEvent> {
        self.audit.snapshot()
    }

    pub fn filter(&self) -> GatewayFilter {
        self.filter.current()
    }

    pub fn is_filter_confirmed(&self) -> bool {
        self.filter.is_confirmed()
    }

    /// Start the two-phase removal of a request.
    pub fn remove_request(&self, request_id: &str) {
        self.requests.remove(request_id);
    }

    /// Merge `patch` into the gateway filter and push it upstream.
    pub fn set_filter(&self, patch: FilterPatch) -> GatewayFilter {
        let merged = self.filter.set_filter(patch);
        self.publish(SliceUpdate::Filter);
        merged
    }

    pub fn clear_gateway_requests(&self) {
        self.gateway.clear();
        self.publish(SliceUpdate::Gateway);
    }

    pub fn clear_instance_logs(&self, host_id: &str, instance_id: &str) {
        let key = InstanceKey::new(host_id, instance_id);
        if self.logs.clear(&key) {
            self.publish(SliceUpdate::Logs(key));
        }
    }

    /// Merge REST-fetched routing history into the audit ring.
    pub fn backfill_audit(&self, history: Vec<RoutingEvent>) {
        self.audit.backfill(history);
        self.publish(SliceUpdate::Audit);
    }

    /// Cancel all pending removal and expiry timers.
    pub fn shutdown(&self) {
        self.requests.shutdown();
    }
}
