//! Host status slice

use crate::events::{HostStatus, MemorySnapshot};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Hosts keyed by host id.
///
/// Kept behind one lock so a bulk `initial_status` replace is never observed
/// half-applied.
#[derive(Default)]
pub struct HostSlice {
    entries: RwLock<HashMap<String, HostStatus>>,
}

impl HostSlice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole slice. Entries without a host id are skipped.
    pub fn replace_all(&self, hosts: Vec<HostStatus>) {
        let mut next = HashMap::with_capacity(hosts.len());
        for host in hosts {
            if host.host_id.is_empty() {
                tracing::warn!(name = %host.name, "Skipping host entry without host_id");
                continue;
            }
            next.insert(host.host_id.clone(), host);
        }
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn upsert(&self, host: HostStatus) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.host_id.clone(), host);
    }

    /// Overwrite the memory field of a known host. Returns false for unknown hosts.
    pub fn patch_memory(&self, host_id: &str, memory: Option<MemorySnapshot>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(host_id) {
            Some(host) => {
                if memory.is_some() {
                    host.memory = memory;
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, host_id: &str) -> Option<HostStatus> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host_id)
            .cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, HostStatus> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::HostState;

    fn host(id: &str, status: HostState) -> HostStatus {
        HostStatus {
            host_id: id.to_string(),
            name: format!("host-{}", id),
            status,
            url: format!("http://{}:9000", id),
            memory: None,
            last_seen: None,
        }
    }

    #[test]
    fn test_replace_all_drops_absent_hosts() {
        let slice = HostSlice::new();
        slice.replace_all(vec![host("h1", HostState::Online), host("h2", HostState::Online)]);
        slice.replace_all(vec![host("h2", HostState::Offline)]);

        assert_eq!(slice.len(), 1);
        assert!(slice.get("h1").is_none());
        assert_eq!(slice.get("h2").unwrap().status, HostState::Offline);
    }

    #[test]
    fn test_replace_all_skips_entries_without_id() {
        let slice = HostSlice::new();
        slice.replace_all(vec![host("", HostState::Online), host("h1", HostState::Online)]);
        assert_eq!(slice.len(), 1);
    }

    #[test]
    fn test_upsert_overwrites_single_host() {
        let slice = HostSlice::new();
        slice.upsert(host("h1", HostState::Online));
        slice.upsert(host("h1", HostState::Error));
        assert_eq!(slice.len(), 1);
        assert_eq!(slice.get("h1").unwrap().status, HostState::Error);
    }

    #[test]
    fn test_patch_memory_only_touches_memory() {
        let slice = HostSlice::new();
        slice.upsert(host("h1", HostState::Online));
        let memory = MemorySnapshot {
            used: 12.0,
            total: 48.0,
            percent: 25.0,
            kind: Some("vram".to_string()),
        };

        assert!(slice.patch_memory("h1", Some(memory.clone())));
        let updated = slice.get("h1").unwrap();
        assert_eq!(updated.memory, Some(memory));
        assert_eq!(updated.status, HostState::Online);
        assert_eq!(updated.name, "host-h1");
    }

    #[test]
    fn test_patch_memory_unknown_host_is_noop() {
        let slice = HostSlice::new();
        assert!(!slice.patch_memory("ghost", Some(MemorySnapshot::default())));
        assert!(slice.is_empty());
    }
}
