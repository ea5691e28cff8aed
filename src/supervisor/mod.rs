//! Supervision of pool instances
//!
//! The wire-level pool implementation is an opaque, pluggable subsystem;
//! this module only knows how to start N of them and keep them running.
//! `InstanceDriver` is the seam: it validates a start synchronously and
//! hands back the instance's run future, which the supervisor owns under a
//! restart-on-crash policy with exponential backoff.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::{PoolConfig, PoolVariant};
use crate::key::DestinationKey;
use crate::registry::Registry;

/// Identity of one running pool instance, unique per supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a running pool instance
///
/// Cheap to clone; the supervisor owns the instance itself, the registry and
/// callers only hold these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolHandle {
    id: InstanceId,
    variant: PoolVariant,
}

impl PoolHandle {
    pub fn new(id: InstanceId, variant: PoolVariant) -> Self {
        Self { id, variant }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn variant(&self) -> PoolVariant {
        self.variant
    }
}

/// Variant-tagged constructor arguments for one pool instance
///
/// Each variant carries exactly the argument shape its implementation
/// expects; adding a pool variant means adding a case here and in
/// `ChildSpec::new`.
#[derive(Debug, Clone)]
pub enum ChildSpec {
    /// Single-stream pool instance
    Stream {
        key: DestinationKey,
        size: usize,
        config: Arc<PoolConfig>,
        max_idle_time: Option<Duration>,
        metrics: bool,
        index: usize,
    },

    /// Multiplexed-stream pool instance (sizing is per-connection stream
    /// negotiation, so no size or idle arguments)
    Multiplexed {
        key: DestinationKey,
        config: Arc<PoolConfig>,
        metrics: bool,
        index: usize,
    },
}

impl ChildSpec {
    /// Build the spec for instance `index` of a resolved configuration
    pub fn new(key: DestinationKey, config: Arc<PoolConfig>, index: usize) -> Self {
        match config.variant {
            PoolVariant::Stream => ChildSpec::Stream {
                key,
                size: config.size,
                max_idle_time: config.max_idle_time,
                metrics: config.metrics,
                config,
                index,
            },
            PoolVariant::Multiplexed => ChildSpec::Multiplexed {
                key,
                metrics: config.metrics,
                config,
                index,
            },
        }
    }

    pub fn key(&self) -> &DestinationKey {
        match self {
            ChildSpec::Stream { key, .. } | ChildSpec::Multiplexed { key, .. } => key,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ChildSpec::Stream { index, .. } | ChildSpec::Multiplexed { index, .. } => *index,
        }
    }

    pub fn variant(&self) -> PoolVariant {
        match self {
            ChildSpec::Stream { .. } => PoolVariant::Stream,
            ChildSpec::Multiplexed { .. } => PoolVariant::Multiplexed,
        }
    }
}

/// The run future of a launched instance
pub type DriverFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// The opaque pool implementation behind the supervisor
///
/// `launch` performs synchronous start validation and returns the instance's
/// run future; a launch error is fatal to the enclosing creation sequence.
/// The production driver is the wire-protocol subsystem; tests plug in stubs.
pub trait InstanceDriver: Send + Sync {
    fn launch(&self, spec: &ChildSpec) -> anyhow::Result<DriverFuture>;
}

/// Error starting a pool instance
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to start pool instance {index} for {key}: {source}")]
    Launch {
        key: DestinationKey,
        index: usize,
        #[source]
        source: anyhow::Error,
    },
}

/// Restart-on-crash policy for supervised instances
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// Restart attempts before giving up on an instance
    pub max_restarts: u32,

    /// Backoff before the first restart; doubles per attempt
    pub base_backoff: Duration,

    /// Backoff ceiling
    pub max_backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RestartPolicy {
    /// Backoff before restart attempt `attempt` (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff
            .checked_mul(1u32 << exponent)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// Starts pool instances and keeps them running
///
/// Owns the instances it starts: each one runs as an independent task, and a
/// crash triggers a relaunch through the driver until the restart budget is
/// exhausted.
pub struct Supervisor {
    registry: Arc<Registry>,
    driver: Arc<dyn InstanceDriver>,
    policy: RestartPolicy,
    next_id: AtomicU64,
}

impl Supervisor {
    pub fn new(registry: Arc<Registry>, driver: Arc<dyn InstanceDriver>) -> Arc<Self> {
        Self::with_policy(registry, driver, RestartPolicy::default())
    }

    pub fn with_policy(
        registry: Arc<Registry>,
        driver: Arc<dyn InstanceDriver>,
        policy: RestartPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            driver,
            policy,
            next_id: AtomicU64::new(0),
        })
    }

    /// Start one pool instance
    ///
    /// On success the instance is registered under its destination key and
    /// its run future is supervised on a spawned task. A launch failure
    /// leaves nothing registered for this spec.
    pub fn start_child(&self, spec: ChildSpec) -> Result<PoolHandle, SpawnError> {
        let run = self.driver.launch(&spec).map_err(|source| SpawnError::Launch {
            key: spec.key().clone(),
            index: spec.index(),
            source,
        })?;

        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = PoolHandle::new(id, spec.variant());
        self.registry.register(spec.key().clone(), handle.clone());

        debug!(
            registry = %self.registry.name(),
            key = %spec.key(),
            instance = %id,
            index = spec.index(),
            variant = ?spec.variant(),
            "Started pool instance"
        );

        let driver = Arc::clone(&self.driver);
        let policy = self.policy.clone();
        tokio::spawn(supervise(run, driver, spec, policy, id));

        Ok(handle)
    }
}

/// Drive one instance's run future, restarting on crash
async fn supervise(
    mut run: DriverFuture,
    driver: Arc<dyn InstanceDriver>,
    spec: ChildSpec,
    policy: RestartPolicy,
    id: InstanceId,
) {
    let mut attempts = 0u32;
    loop {
        match run.await {
            Ok(()) => {
                debug!(key = %spec.key(), instance = %id, "Pool instance exited");
                break;
            }
            Err(e) => {
                attempts += 1;
                if attempts > policy.max_restarts {
                    error!(
                        key = %spec.key(),
                        instance = %id,
                        error = %e,
                        restarts = attempts - 1,
                        "Pool instance crashed, restart budget exhausted"
                    );
                    break;
                }

                let backoff = policy.backoff(attempts);
                warn!(
                    key = %spec.key(),
                    instance = %id,
                    error = %e,
                    attempt = attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    "Pool instance crashed, restarting"
                );
                tokio::time::sleep(backoff).await;

                match driver.launch(&spec) {
                    Ok(next) => run = next,
                    Err(e) => {
                        error!(
                            key = %spec.key(),
                            instance = %id,
                            error = %e,
                            "Pool instance relaunch failed"
                        );
                        break;
                    }
                }
            }
        }
    }
}
