//! Destination registry: concurrent key -> pool-instance map
//!
//! Lookups and registrations are lock-free (sharded map); the registry also
//! carries a single write-once meta slot publishing the owning manager so
//! that any caller holding only the registry can reach it.

use dashmap::DashMap;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

use crate::key::DestinationKey;
use crate::manager::PoolManager;
use crate::supervisor::PoolHandle;

/// Registry of live pool instances, keyed by destination
pub struct Registry {
    /// Registry name, carried in logs and useful when a process hosts
    /// several managers
    name: String,

    /// Registered instances per destination; group size is fixed at
    /// creation time, entries are never removed
    groups: DashMap<DestinationKey, Vec<PoolHandle>>,

    /// The owning manager, published once at initialization
    manager: OnceLock<Weak<PoolManager>>,
}

impl Registry {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            groups: DashMap::new(),
            manager: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an instance under a destination key
    ///
    /// Idempotent on instance id: a duplicate registration for an already
    /// registered handle is ignored. Creation is serialized, so duplicates
    /// are not expected in practice.
    pub fn register(&self, key: DestinationKey, handle: PoolHandle) {
        let mut group = self.groups.entry(key.clone()).or_default();
        if group.iter().any(|h| h.id() == handle.id()) {
            return;
        }
        group.push(handle.clone());
        debug!(
            registry = %self.name,
            key = %key,
            instance = %handle.id(),
            group_size = group.len(),
            "Registered pool instance"
        );
    }

    /// All instances registered under a key; empty on miss
    pub fn lookup_all(&self, key: &DestinationKey) -> Vec<PoolHandle> {
        self.groups
            .get(key)
            .map(|group| group.clone())
            .unwrap_or_default()
    }

    /// Publish the owning manager into the meta slot
    ///
    /// Only the first call takes effect. Stored as a `Weak` so the registry
    /// does not keep the manager alive on its own.
    pub fn put_manager(&self, manager: &Arc<PoolManager>) {
        let _ = self.manager.set(Arc::downgrade(manager));
    }

    /// The owning manager, if one has been published and is still alive
    pub fn manager(&self) -> Option<Arc<PoolManager>> {
        self.manager.get().and_then(Weak::upgrade)
    }
}
