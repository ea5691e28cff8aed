//! Derivation of effective per-destination pool configuration
//!
//! Pure policy logic: explicit-override merge with default fallback, TLS
//! option sanitization for plaintext destinations, and hostname defaulting
//! for local-socket destinations. Deterministic, no side effects.

use std::time::Duration;

use super::{ConnOptions, ManagerConfig, PoolVariant};
use crate::key::DestinationKey;

/// Hostname injected when a local-socket destination has no explicit one
pub const FALLBACK_HOSTNAME: &str = "localhost";

/// Transport-option names that only make sense under TLS
///
/// These are removed from the nested transport mapping when the destination
/// scheme is plaintext; a plaintext transport rejects them at connect time.
pub const TLS_TRANSPORT_OPTIONS: &[&str] = &[
    "cacertfile",
    "ciphers",
    "depth",
    "eccs",
    "hibernate_after",
    "partial_chain",
    "reuse_sessions",
    "secure_renegotiate",
    "server_name_indication",
    "sigalgs",
    "sigalgs_cert",
    "supported_groups",
    "verify",
    "verify_fun",
    "versions",
];

/// Effective configuration for one pool group, immutable once computed
///
/// Every instance registered under the same destination key is created from
/// one of these, computed once at group-creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub variant: PoolVariant,

    /// Number of instances in the group; at least 1, fixed for the group's
    /// lifetime
    pub count: usize,

    /// Per-instance size
    pub size: usize,

    /// Maximum idle time per connection; `None` means unlimited
    pub max_idle_time: Option<Duration>,

    pub metrics: bool,

    pub conn: ConnOptions,
}

/// Resolve the effective configuration for a destination
///
/// Looks the key up in the explicit per-destination map, falling back to the
/// default options (absence is not an error), then sanitizes the result for
/// the key's scheme and address form.
pub fn resolve(config: &ManagerConfig, key: &DestinationKey) -> PoolConfig {
    let options = config.per_key.get(key).unwrap_or(&config.default_pool);
    let mut conn = options.conn.clone();

    // TLS parameters crash a plaintext transport at connect time. Strip the
    // recognized set for the plaintext scheme only; every other scheme
    // passes through untouched.
    if key.scheme.is_plaintext() {
        if let Some(transport) = conn.transport.as_mut() {
            for name in TLS_TRANSPORT_OPTIONS {
                transport.remove(*name);
            }
        }
    }

    // Local sockets carry no usable hostname; requests still need one for
    // the host header. An explicit hostname always wins.
    if !key.host.is_textual() && conn.hostname.is_none() {
        conn.hostname = Some(FALLBACK_HOSTNAME.to_string());
    }

    PoolConfig {
        variant: options.variant,
        count: options.count.max(1),
        size: options.size,
        max_idle_time: options.max_idle_time(),
        metrics: options.metrics,
        conn,
    }
}
