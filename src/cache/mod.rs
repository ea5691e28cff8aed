//! Fast-path cache: advisory per-manager metadata with lock-free reads
//!
//! Holds the published instance counts (written once per destination when
//! metrics are enabled) and the set of default keys (destinations that were
//! auto-discovered rather than explicitly configured). Both are written only
//! through the manager's serialized coordination path and read lock-free by
//! anyone. Losing this state never corrupts pool lookup or creation, which
//! depend solely on the registry and the coordination path.

use dashmap::{DashMap, DashSet};
use std::collections::HashSet;

use crate::key::DestinationKey;

#[derive(Default)]
pub struct FastCache {
    /// Instance count per destination, published when metrics are enabled
    counts: DashMap<DestinationKey, usize>,

    /// Destinations that had no explicit configuration at creation time
    defaults: DashSet<DestinationKey>,
}

impl FastCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything; run at manager initialization
    pub fn reset(&self) {
        self.counts.clear();
        self.defaults.clear();
    }

    pub fn set_instance_count(&self, key: DestinationKey, count: usize) {
        self.counts.insert(key, count);
    }

    /// Published instance count; absent if metrics were disabled or the
    /// destination was never created
    pub fn instance_count(&self, key: &DestinationKey) -> Option<usize> {
        self.counts.get(key).map(|count| *count)
    }

    pub fn track_default(&self, key: DestinationKey) {
        self.defaults.insert(key);
    }

    /// Remove a key from the default set; no-op if absent
    pub fn untrack_default(&self, key: &DestinationKey) {
        self.defaults.remove(key);
    }

    pub fn is_default(&self, key: &DestinationKey) -> bool {
        self.defaults.contains(key)
    }

    /// Snapshot of the default-key set, safe to iterate without blocking
    /// future mutations
    pub fn default_keys(&self) -> HashSet<DestinationKey> {
        self.defaults.iter().map(|key| key.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Scheme;

    fn key(host: &str) -> DestinationKey {
        DestinationKey::new(Scheme::Http, host, 80)
    }

    #[test]
    fn test_instance_count_absent_by_default() {
        let cache = FastCache::new();
        assert_eq!(cache.instance_count(&key("a.test")), None);
    }

    #[test]
    fn test_instance_count_roundtrip() {
        let cache = FastCache::new();
        cache.set_instance_count(key("a.test"), 4);
        assert_eq!(cache.instance_count(&key("a.test")), Some(4));
    }

    #[test]
    fn test_default_key_tracking() {
        let cache = FastCache::new();
        cache.track_default(key("a.test"));

        assert!(cache.is_default(&key("a.test")));
        assert_eq!(cache.default_keys(), HashSet::from([key("a.test")]));

        cache.untrack_default(&key("a.test"));
        assert!(!cache.is_default(&key("a.test")));

        // Untracking twice, or a key never tracked, is a no-op
        cache.untrack_default(&key("a.test"));
        cache.untrack_default(&key("never.test"));
        assert!(cache.default_keys().is_empty());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let cache = FastCache::new();
        cache.track_default(key("a.test"));

        let snapshot = cache.default_keys();
        cache.track_default(key("b.test"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(cache.default_keys().len(), 2);
    }

    #[test]
    fn test_reset_clears_everything() {
        let cache = FastCache::new();
        cache.set_instance_count(key("a.test"), 2);
        cache.track_default(key("b.test"));

        cache.reset();

        assert_eq!(cache.instance_count(&key("a.test")), None);
        assert!(cache.default_keys().is_empty());
    }
}
