//! Gateway request summary feed
//!
//! Maintains the newest completed gateway requests, newest first.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use crate::events::GatewayRequestSummary;

/// Bounded newest-first buffer of gateway request summaries
pub struct GatewaySlice {
    entries: RwLock<VecDeque<GatewayRequestSummary>>,
    capacity: usize,
}

impl GatewaySlice {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Prepend a summary, evicting the oldest entry if at capacity
    pub fn push(&self, summary: GatewayRequestSummary) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(summary);
        entries.truncate(self.capacity);
    }

    /// Returns all entries, newest first
    pub fn snapshot(&self) -> Vec<GatewayRequestSummary> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Empties the buffer (used when the filter changes)
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
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
