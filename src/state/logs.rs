//! Per-instance log ring buffers

use crate::events::{InstanceKey, LogLine};
use dashmap::DashMap;
use std::collections::VecDeque;

/// Live log lines per instance, bounded to the newest `capacity` lines.
pub struct LogSlice {
    entries: DashMap<InstanceKey, VecDeque<LogLine>>,
    capacity: usize,
}

impl LogSlice {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a line, evicting the oldest lines past capacity.
    pub fn append(&self, key: InstanceKey, line: LogLine) {
        let mut lines = self.entries.entry(key).or_default();
        lines.push_back(line);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// Retained lines for `key`, oldest first.
    pub fn lines(&self, key: &InstanceKey) -> Vec<LogLine> {
        self.entries
            .get(key)
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all retained lines for `key`. Returns false if nothing was held.
    pub fn clear(&self, key: &InstanceKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn keys(&self) -> Vec<InstanceKey> {
        let mut keys: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
