//! Routing audit timeline
//!
//! Keeps `request_error` and `request_reroute` events, ascending by timestamp,
//! bounded from the oldest end.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use crate::events::RoutingEvent;
use crate::reconcile::merge_routing_events;

/// Bounded, time-ordered ring of routing events
pub struct AuditSlice {
    entries: RwLock<VecDeque<RoutingEvent>>,
    capacity: usize,
}

impl AuditSlice {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record one live event.
    pub fn push(&self, event: RoutingEvent) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let out_of_order = entries
            .back()
            .is_some_and(|last| last.timestamp > event.timestamp);
        entries.push_back(event);
        if out_of_order {
            entries
                .make_contiguous()
                .sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        }
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Merge historical events fetched over REST into the ring.
    pub fn backfill(&self, history: Vec<RoutingEvent>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let current: Vec<RoutingEvent> = entries.drain(..).collect();
        *entries = merge_routing_events(&current, &history, self.capacity).into();
    }

    /// Returns all events, oldest first
    pub fn snapshot(&self) -> Vec<RoutingEvent> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
