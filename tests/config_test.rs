//! Configuration loading and resolution end-to-end
//!
//! Loads a YAML file the way a deployment would, then checks the resolver's
//! sanitization and defaulting against the resulting configuration.

use destpool::config::{load_from_yaml, resolve, ManagerConfig};
use destpool::{DestinationKey, PoolVariant, Scheme};
use serde_yaml::Value;
use std::fs;
use tempfile::TempDir;

const CONFIG_YAML: &str = r#"
default_pool:
  size: 20

pools:
  "http://example.com:80":
    count: 2
    size: 10
    metrics: true
    conn:
      transport:
        verify: verify_peer
        cacertfile: /etc/ssl/ca.pem
        keepalive: true

  "https://api.test:443":
    variant: multiplexed
    max_idle_ms: 30000
    conn:
      transport:
        verify: verify_peer
"#;

fn load_config() -> ManagerConfig {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("destpool.yaml");
    fs::write(&config_path, CONFIG_YAML).unwrap();

    let raw = load_from_yaml(&config_path).unwrap();
    ManagerConfig::from_raw(raw).unwrap()
}

#[test]
fn test_load_yaml_config() {
    let config = load_config();
    assert_eq!(config.default_pool.size, 20);
    assert_eq!(config.per_key.len(), 2);
}

#[test]
fn test_resolve_plaintext_pool_strips_tls_options() {
    let config = load_config();
    let key = DestinationKey::new(Scheme::Http, "example.com", 80);

    let resolved = resolve(&config, &key);
    assert_eq!(resolved.count, 2);
    assert_eq!(resolved.size, 10);
    assert!(resolved.metrics);

    let transport = resolved.conn.transport.unwrap();
    assert!(!transport.contains_key("verify"));
    assert!(!transport.contains_key("cacertfile"));
    assert_eq!(transport.get("keepalive"), Some(&Value::Bool(true)));
}

#[test]
fn test_resolve_https_pool_keeps_tls_options() {
    let config = load_config();
    let key = DestinationKey::new(Scheme::Https, "api.test", 443);

    let resolved = resolve(&config, &key);
    assert_eq!(resolved.variant, PoolVariant::Multiplexed);
    assert_eq!(
        resolved.max_idle_time,
        Some(std::time::Duration::from_secs(30))
    );

    let transport = resolved.conn.transport.unwrap();
    assert_eq!(
        transport.get("verify"),
        Some(&Value::String("verify_peer".into()))
    );
}

#[test]
fn test_resolve_unconfigured_key_uses_defaults() {
    let config = load_config();
    let key = DestinationKey::new(Scheme::Https, "other.test", 8443);

    let resolved = resolve(&config, &key);
    assert_eq!(resolved.size, 20);
    assert_eq!(resolved.count, 1);
    assert!(!resolved.metrics);
}

#[test]
fn test_resolve_local_socket_key_defaults_hostname() {
    let config = load_config();
    let key = DestinationKey::local(Scheme::Http, "/tmp/sock");

    let resolved = resolve(&config, &key);
    assert_eq!(resolved.conn.hostname.as_deref(), Some("localhost"));
}
