//! Pool lifecycle manager: the serialized coordination path
//!
//! Decides, for any destination a caller wants to reach, whether a pool
//! group already exists, creates it exactly once if not, and hands back an
//! instance to use. Lookups for already-created destinations are lock-free
//! registry reads; only creation and default-key bookkeeping go through the
//! coordination mutex.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::FastCache;
use crate::config::{resolve, ManagerConfig, PoolConfig, RawConfig};
use crate::key::{DestinationKey, KeyParseError};
use crate::registry::Registry;
use crate::select::{RandomSelect, SelectStrategy};
use crate::supervisor::{ChildSpec, PoolHandle, SpawnError, Supervisor};

/// Options for a pool request
#[derive(Debug, Clone, Copy)]
pub struct GetPoolOptions {
    /// Create the pool group on a miss; when false, a miss is a plain
    /// `None` with no side effects
    pub auto_start: bool,
}

impl Default for GetPoolOptions {
    fn default() -> Self {
        Self { auto_start: true }
    }
}

/// Error from manager initialization or pool creation
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    ChildStart(#[from] SpawnError),

    #[error(transparent)]
    Key(#[from] KeyParseError),
}

/// State owned exclusively by the coordination path
#[derive(Debug, Default)]
struct CoordinatorState {
    /// Creation sequences run since initialization
    creations: u64,
}

/// Lifecycle manager for one registry's pool groups
///
/// All creation traffic for this manager funnels through one mutex, so at
/// most one creation sequence runs at any instant (single-flight). A
/// per-key coordinator map would be a strictly stronger, still-correct
/// upgrade if creation throughput ever warrants it.
pub struct PoolManager {
    config: ManagerConfig,
    registry: Arc<Registry>,
    supervisor: Arc<Supervisor>,
    cache: FastCache,
    strategy: Box<dyn SelectStrategy>,
    coordinator: Mutex<CoordinatorState>,
}

impl PoolManager {
    /// Initialize a manager over a registry and supervisor
    ///
    /// Parses the raw per-destination keys, resets the fast-path cache,
    /// publishes the manager into the registry's meta slot, then eagerly
    /// creates a pool group for every explicitly configured destination.
    /// The first eager-creation failure aborts initialization.
    pub fn initialize(
        raw: RawConfig,
        registry: Arc<Registry>,
        supervisor: Arc<Supervisor>,
    ) -> Result<Arc<Self>, ManagerError> {
        Self::initialize_with_strategy(raw, registry, supervisor, Box::new(RandomSelect))
    }

    /// `initialize` with a non-default selection strategy
    pub fn initialize_with_strategy(
        raw: RawConfig,
        registry: Arc<Registry>,
        supervisor: Arc<Supervisor>,
        strategy: Box<dyn SelectStrategy>,
    ) -> Result<Arc<Self>, ManagerError> {
        let config = ManagerConfig::from_raw(raw)?;

        let manager = Arc::new(Self {
            config,
            registry: Arc::clone(&registry),
            supervisor,
            cache: FastCache::new(),
            strategy,
            coordinator: Mutex::new(CoordinatorState::default()),
        });
        manager.cache.reset();
        registry.put_manager(&manager);

        let explicit: Vec<DestinationKey> = manager.config.per_key.keys().cloned().collect();
        info!(
            registry = %registry.name(),
            explicit_pools = explicit.len(),
            "Initializing pool manager"
        );
        for key in explicit {
            manager.create_group(&key)?;
        }

        Ok(manager)
    }

    /// The manager owning a registry, via the registry's meta slot
    pub fn for_registry(registry: &Registry) -> Option<Arc<PoolManager>> {
        registry.manager()
    }

    /// Get a pool instance for a destination
    ///
    /// A registered destination is served lock-free from the registry with
    /// one instance picked by the selection strategy. On a miss, behavior
    /// depends on `auto_start`: `Ok(None)` with no side effects, or a
    /// serialized creation sequence whose result every concurrent caller
    /// for the same destination converges on.
    pub fn get_pool(
        &self,
        key: &DestinationKey,
        options: GetPoolOptions,
    ) -> Result<Option<PoolHandle>, ManagerError> {
        let existing = self.registry.lookup_all(key);
        if let Some(handle) = self.strategy.pick(&existing) {
            return Ok(Some(handle.clone()));
        }

        if !options.auto_start {
            return Ok(None);
        }

        self.create_group(key).map(Some)
    }

    /// Run the creation sequence for a destination, serialized
    ///
    /// The registry re-check under the lock closes the race window between
    /// a caller's lock-free miss and its turn here: a loser finds the
    /// winner's registrations and returns one of them without creating
    /// anything.
    fn create_group(&self, key: &DestinationKey) -> Result<PoolHandle, ManagerError> {
        let mut coordinator = self.coordinator.lock();

        let existing = self.registry.lookup_all(key);
        if let Some(handle) = self.strategy.pick(&existing) {
            debug!(key = %key, "Pool group already created by a concurrent caller");
            return Ok(handle.clone());
        }

        let config = Arc::new(resolve(&self.config, key));
        if !self.config.is_explicit(key) {
            self.cache.track_default(key.clone());
        }
        if config.metrics {
            self.cache.set_instance_count(key.clone(), config.count);
        }

        info!(
            registry = %self.registry.name(),
            key = %key,
            variant = ?config.variant,
            count = config.count,
            size = config.size,
            "Creating pool group"
        );

        let first = self.start_instance(key, &config, 0)?;
        for index in 1..config.count {
            self.start_instance(key, &config, index)?;
        }

        coordinator.creations += 1;
        Ok(first)
    }

    fn start_instance(
        &self,
        key: &DestinationKey,
        config: &Arc<PoolConfig>,
        index: usize,
    ) -> Result<PoolHandle, ManagerError> {
        let spec = ChildSpec::new(key.clone(), Arc::clone(config), index);
        self.supervisor.start_child(spec).map_err(|e| {
            if index > 0 {
                // Instances started before the failure stay registered; a
                // later lookup serves this partial group rather than
                // retrying creation.
                warn!(
                    key = %key,
                    started = index,
                    requested = config.count,
                    "Pool group creation failed partway"
                );
            }
            ManagerError::from(e)
        })
    }

    /// Idempotently remove a destination from the default-key set
    ///
    /// Serialized with creation; has no effect on running instances and is
    /// safe to call on a key that was never tracked.
    pub fn untrack_default(&self, key: &DestinationKey) {
        let _coordinator = self.coordinator.lock();
        self.cache.untrack_default(key);
    }

    /// Published instance count for a destination; lock-free, absent if
    /// metrics were disabled or the group was never created
    pub fn instance_count(&self, key: &DestinationKey) -> Option<usize> {
        self.cache.instance_count(key)
    }

    /// Snapshot of the auto-discovered (unconfigured) destination keys
    pub fn default_keys(&self) -> HashSet<DestinationKey> {
        self.cache.default_keys()
    }

    /// Number of creation sequences run since initialization
    pub fn creation_sequences(&self) -> u64 {
        self.coordinator.lock().creations
    }
}
