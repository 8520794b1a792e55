//! Instance runtime state slice

use crate::events::{InstanceKey, InstanceRuntimeState};
use dashmap::DashMap;

/// Latest runtime snapshot per instance. Entries are never evicted.
#[derive(Default)]
pub struct InstanceSlice {
    entries: DashMap<InstanceKey, InstanceRuntimeState>,
}

impl InstanceSlice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `key` with `state` as-is.
    pub fn replace(&self, key: InstanceKey, state: InstanceRuntimeState) {
        self.entries.insert(key, state);
    }

    pub fn get(&self, key: &InstanceKey) -> Option<InstanceRuntimeState> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn snapshot(&self) -> Vec<(InstanceKey, InstanceRuntimeState)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
