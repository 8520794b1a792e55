//! Request lifecycle slice.
//!
//! Each request moves `pending -> processing -> {success | error}`. Status is
//! never moved backwards: a late `request_start` for a request that is already
//! processing or finished only refreshes descriptive fields, and terminal
//! states are final.
//!
//! Removal is two-phase: the entry is flagged `removing` immediately and
//! deleted after the removal grace period. Successful requests start that
//! removal on their own so that they are gone `success_expiry` after success.

use crate::config::RetentionConfig;
use crate::events::{RequestPayload, Timestamp};
use crate::scheduler::DelayedTasks;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;

use super::SliceUpdate;

/// Lifecycle status of a routed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Error,
}

impl RequestStatus {
    fn rank(self) -> u8 {
        match self {
            RequestStatus::Pending => 0,
            RequestStatus::Processing => 1,
            RequestStatus::Success | RequestStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }
}

/// View of one in-flight or recently finished request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RequestState {
    pub request_id: String,
    pub model: Option<String>,
    pub resolved_model: Option<String>,
    pub endpoint: Option<String>,
    pub host_id: Option<String>,
    pub host_name: Option<String>,
    pub instance_id: Option<String>,
    pub instance_name: Option<String>,
    pub status: RequestStatus,
    pub error: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    pub stream: bool,
    pub client_ip: Option<String>,
    pub started_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    /// Set while the entry waits out its removal grace period
    pub removing: bool,
}

impl RequestState {
    fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            ..Default::default()
        }
    }

    /// Move to `next` unless that would lower lifecycle progress or leave a
    /// terminal state. Returns whether the status changed.
    fn advance(&mut self, next: RequestStatus) -> bool {
        if self.status.is_terminal() || next.rank() < self.status.rank() {
            return false;
        }
        let changed = self.status != next;
        self.status = next;
        changed
    }

    fn absorb_routing(&mut self, payload: &RequestPayload) {
        set_if_some(&mut self.host_id, &payload.host_id);
        set_if_some(&mut self.host_name, &payload.host_name);
        set_if_some(&mut self.instance_id, &payload.instance_id);
        set_if_some(&mut self.instance_name, &payload.instance_name);
        set_if_some(&mut self.resolved_model, &payload.resolved_model);
    }

    fn touch(&mut self, payload: &RequestPayload) {
        if payload.timestamp.is_some() {
            self.updated_at = payload.timestamp;
        }
    }
}

fn set_if_some<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *target = Some(v.clone());
    }
}

/// Requests keyed by request id, with delayed removal.
pub struct RequestSlice {
    entries: DashMap<String, RequestState>,
    timers: DelayedTasks,
    removal_grace: Duration,
    success_expiry: Duration,
    updates: broadcast::Sender<SliceUpdate>,
}

impl RequestSlice {
    pub fn new(retention: &RetentionConfig, updates: broadcast::Sender<SliceUpdate>) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            timers: DelayedTasks::new(),
            removal_grace: retention.removal_grace(),
            success_expiry: retention.success_expiry(),
            updates,
        })
    }

    /// `request_start`: create the entry or refresh its descriptive fields.
    pub fn start(&self, payload: &RequestPayload) {
        let mut entry = self
            .entries
            .entry(payload.request_id.clone())
            .or_insert_with(|| RequestState::new(&payload.request_id));

        if entry.status != RequestStatus::Pending {
            tracing::debug!(
                request_id = %payload.request_id,
                status = ?entry.status,
                "request_start for a request already past pending, keeping status"
            );
        }
        set_if_some(&mut entry.model, &payload.model);
        set_if_some(&mut entry.endpoint, &payload.endpoint);
        set_if_some(&mut entry.client_ip, &payload.client_ip);
        if let Some(stream) = payload.stream {
            entry.stream = stream;
        }
        if payload.timestamp.is_some() {
            entry.started_at = payload.timestamp;
        }
        entry.touch(payload);
    }

    /// `request_routed`: move to processing and attach the routing target.
    pub fn routed(&self, payload: &RequestPayload) {
        let mut entry = self
            .entries
            .entry(payload.request_id.clone())
            .or_insert_with(|| RequestState::new(&payload.request_id));
        entry.advance(RequestStatus::Processing);
        entry.absorb_routing(payload);
        entry.touch(payload);
    }

    /// `request_success`: finish the request and schedule its expiry.
    pub fn succeeded(self: &Arc<Self>, payload: &RequestPayload) {
        let is_success = {
            let mut entry = self
                .entries
                .entry(payload.request_id.clone())
                .or_insert_with(|| RequestState::new(&payload.request_id));
            entry.advance(RequestStatus::Success);
            entry.absorb_routing(payload);
            if payload.duration.is_some() {
                entry.duration = payload.duration;
            }
            entry.touch(payload);
            entry.status == RequestStatus::Success
        };

        if is_success {
            let weak = Arc::downgrade(self);
            let id = payload.request_id.clone();
            let delay = self.success_expiry.saturating_sub(self.removal_grace);
            self.timers
                .schedule(format!("expire:{}", id), delay, move || {
                    if let Some(slice) = weak.upgrade() {
                        slice.remove(&id);
                    }
                });
        }
    }

    /// `request_error`: finish the request; it stays until dismissed.
    pub fn failed(&self, payload: &RequestPayload) {
        let mut entry = self
            .entries
            .entry(payload.request_id.clone())
            .or_insert_with(|| RequestState::new(&payload.request_id));
        entry.advance(RequestStatus::Error);
        entry.absorb_routing(payload);
        set_if_some(&mut entry.error, &payload.error);
        if payload.duration.is_some() {
            entry.duration = payload.duration;
        }
        entry.touch(payload);
    }

    /// Two-phase removal: flag `removing` now, delete after the grace period.
    ///
    /// Unknown ids skip the flag but still schedule the (harmless) delete.
    pub fn remove(self: &Arc<Self>, request_id: &str) {
        if let Some(mut entry) = self.entries.get_mut(request_id) {
            entry.removing = true;
        }
        let _ = self.updates.send(SliceUpdate::Request(request_id.to_string()));

        let weak: Weak<Self> = Arc::downgrade(self);
        let id = request_id.to_string();
        self.timers
            .schedule(format!("remove:{}", id), self.removal_grace, move || {
                if let Some(slice) = weak.upgrade() {
                    if slice.entries.remove(&id).is_some() {
                        let _ = slice.updates.send(SliceUpdate::RequestRemoved(id));
                    }
                }
            });
    }

    pub fn get(&self, request_id: &str) -> Option<RequestState> {
        self.entries.get(request_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.entries.contains_key(request_id)
    }

    /// All requests, oldest start first.
    pub fn snapshot(&self) -> Vec<RequestState> {
        let mut all: Vec<_> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of removal and expiry timers still pending.
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Cancel every outstanding removal and expiry timer.
    pub fn shutdown(&self) {
        self.timers.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice() -> Arc<RequestSlice> {
        let (tx, _) = broadcast::channel(16);
        RequestSlice::new(&RetentionConfig::default(), tx)
    }

    fn payload(id: &str) -> RequestPayload {
        RequestPayload {
            request_id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_start_creates_pending() {
        let requests = slice();
        requests.start(&RequestPayload {
            model: Some("llama-7b".to_string()),
            stream: Some(true),
            ..payload("r1")
        });

        let state = requests.get("r1").unwrap();
        assert_eq!(state.status, RequestStatus::Pending);
        assert_eq!(state.model.as_deref(), Some("llama-7b"));
        assert!(state.stream);
        assert!(!state.removing);
    }

    #[test]
    fn test_routed_without_start_creates_entry() {
        let requests = slice();
        requests.routed(&RequestPayload {
            host_id: Some("h1".to_string()),
            instance_id: Some("i1".to_string()),
            resolved_model: Some("llama-7b-q4".to_string()),
            ..payload("r1")
        });

        let state = requests.get("r1").unwrap();
        assert_eq!(state.status, RequestStatus::Processing);
        assert_eq!(state.host_id.as_deref(), Some("h1"));
        assert_eq!(state.resolved_model.as_deref(), Some("llama-7b-q4"));
    }

    #[test]
    fn test_late_start_does_not_regress_status() {
        let requests = slice();
        requests.start(&payload("r1"));
        requests.routed(&payload("r1"));
        requests.start(&RequestPayload {
            endpoint: Some("/v1/chat/completions".to_string()),
            ..payload("r1")
        });

        let state = requests.get("r1").unwrap();
        assert_eq!(state.status, RequestStatus::Processing);
        assert_eq!(state.endpoint.as_deref(), Some("/v1/chat/completions"));
    }

    #[test]
    fn test_start_keeps_fields_absent_from_event() {
        let requests = slice();
        requests.start(&RequestPayload {
            model: Some("llama-7b".to_string()),
            client_ip: Some("10.0.0.5".to_string()),
            ..payload("r1")
        });
        requests.start(&RequestPayload {
            endpoint: Some("/v1/completions".to_string()),
            ..payload("r1")
        });

        let state = requests.get("r1").unwrap();
        assert_eq!(state.model.as_deref(), Some("llama-7b"));
        assert_eq!(state.client_ip.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_error_records_details_and_stays() {
        let requests = slice();
        requests.start(&payload("r1"));
        requests.failed(&RequestPayload {
            error: Some("no instance available".to_string()),
            duration: Some(0.4),
            host_id: Some("h2".to_string()),
            ..payload("r1")
        });

        let state = requests.get("r1").unwrap();
        assert_eq!(state.status, RequestStatus::Error);
        assert_eq!(state.error.as_deref(), Some("no instance available"));
        assert_eq!(state.duration, Some(0.4));
        assert_eq!(state.host_id.as_deref(), Some("h2"));
        assert_eq!(requests.pending_timers(), 0);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let requests = slice();
        requests.failed(&payload("r1"));
        requests.routed(&payload("r1"));
        requests.start(&payload("r1"));
        assert_eq!(requests.get("r1").unwrap().status, RequestStatus::Error);
    }

    #[test]
    fn test_advance_ranks() {
        let mut state = RequestState::new("r");
        assert!(state.advance(RequestStatus::Processing));
        assert!(!state.advance(RequestStatus::Pending));
        assert!(state.advance(RequestStatus::Success));
        assert!(!state.advance(RequestStatus::Error));
        assert_eq!(state.status, RequestStatus::Success);
    }
}
