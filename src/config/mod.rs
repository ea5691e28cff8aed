use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use crate::key::DestinationKey;

pub mod resolve;

pub use resolve::{resolve, PoolConfig, FALLBACK_HOSTNAME, TLS_TRANSPORT_OPTIONS};

/// Pool implementation variant
///
/// Selects the constructor-argument shape the supervisor uses when starting
/// an instance. Adding a variant means adding a case to `ChildSpec::new`,
/// not touching existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolVariant {
    /// One request per connection at a time
    Stream,
    /// Many concurrent streams multiplexed over each connection
    Multiplexed,
}

fn default_variant() -> PoolVariant {
    PoolVariant::Stream
}

fn default_size() -> usize {
    50
}

fn default_count() -> usize {
    1
}

/// Connection options attached to a pool configuration
///
/// `transport` is a free-form mapping handed to the transport layer; for
/// plaintext destinations the resolver strips recognized TLS entries from it
/// before the configuration is used (passing TLS-only parameters to a
/// plaintext transport fails at connect time).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnOptions {
    /// Explicit hostname override; never overwritten once set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Nested transport-layer options (TLS parameters, socket tuning, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<BTreeMap<String, serde_yaml::Value>>,
}

/// Raw per-destination pool options, before resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Pool implementation variant: stream or multiplexed
    #[serde(default = "default_variant")]
    pub variant: PoolVariant,

    /// Per-instance size (connections held by one instance)
    #[serde(default = "default_size")]
    pub size: usize,

    /// Number of pool instances started for the destination
    #[serde(default = "default_count")]
    pub count: usize,

    /// Maximum idle time per connection in milliseconds (absent = unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_idle_ms: Option<u64>,

    /// Whether to publish the instance count for fast-path metric reads
    #[serde(default)]
    pub metrics: bool,

    /// Connection options
    #[serde(default)]
    pub conn: ConnOptions,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            size: default_size(),
            count: default_count(),
            max_idle_ms: None,
            metrics: false,
            conn: ConnOptions::default(),
        }
    }
}

impl PoolOptions {
    pub fn max_idle_time(&self) -> Option<Duration> {
        self.max_idle_ms.map(Duration::from_millis)
    }
}

/// Raw manager configuration as loaded from a file or built by the caller
///
/// Per-destination keys are textual (`scheme://host:port`) and parsed into
/// `DestinationKey`s at manager initialization; a malformed key is fatal
/// there, not here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    /// Options applied to destinations with no explicit entry
    #[serde(default)]
    pub default_pool: PoolOptions,

    /// Explicit per-destination options
    #[serde(default)]
    pub pools: HashMap<String, PoolOptions>,
}

/// Parsed manager configuration: raw options keyed by destination
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    pub default_pool: PoolOptions,
    pub per_key: HashMap<DestinationKey, PoolOptions>,
}

impl ManagerConfig {
    /// Parse the textual per-destination keys of a raw configuration
    pub fn from_raw(raw: RawConfig) -> Result<Self, crate::key::KeyParseError> {
        let mut per_key = HashMap::with_capacity(raw.pools.len());
        for (key, options) in raw.pools {
            per_key.insert(key.parse::<DestinationKey>()?, options);
        }
        Ok(Self {
            default_pool: raw.default_pool,
            per_key,
        })
    }

    /// Whether the destination has an explicit configuration entry
    pub fn is_explicit(&self, key: &DestinationKey) -> bool {
        self.per_key.contains_key(key)
    }
}

/// Load a raw configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: RawConfig =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(config)
}
