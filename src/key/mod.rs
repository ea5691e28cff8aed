//! Destination identity: the (scheme, host, port) triple that keys a pool group

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// URL scheme of a destination
///
/// `Http` is the plaintext scheme; TLS transport options are stripped from
/// configurations resolved for it (see `config::resolve`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// Whether connections under this scheme run without TLS
    pub fn is_plaintext(&self) -> bool {
        matches!(self, Scheme::Http)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host component of a destination
///
/// Either a textual hostname/address or a non-textual local (filesystem)
/// socket path. Local-socket destinations cannot appear as textual config
/// keys; they are constructed programmatically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    /// Textual hostname or IP address
    Name(String),

    /// Filesystem socket path (e.g. a Unix domain socket)
    Local(PathBuf),
}

impl Host {
    /// Whether the host is a textual hostname/address
    pub fn is_textual(&self) -> bool {
        matches!(self, Host::Name(_))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Name(name) => f.write_str(name),
            Host::Local(path) => write!(f, "[unix:{}]", path.display()),
        }
    }
}

/// Identity of a pool group: where its connections point
///
/// Equality is structural and this triple is the sole identity under which
/// pool instances are registered and looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    pub scheme: Scheme,
    pub host: Host,
    pub port: u16,
}

impl DestinationKey {
    /// Key for a textual hostname destination
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: Host::Name(host.into()),
            port,
        }
    }

    /// Key for a local (filesystem) socket destination
    pub fn local(scheme: Scheme, path: impl Into<PathBuf>) -> Self {
        Self {
            scheme,
            host: Host::Local(path.into()),
            port: 0,
        }
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Error parsing a textual destination key
#[derive(Debug, thiserror::Error)]
pub enum KeyParseError {
    #[error("destination key '{0}' is missing a scheme (expected scheme://host:port)")]
    MissingScheme(String),

    #[error("unknown scheme '{0}' (expected http or https)")]
    UnknownScheme(String),

    #[error("destination key '{0}' is missing a port (expected scheme://host:port)")]
    MissingPort(String),

    #[error("invalid port in destination key '{0}'")]
    InvalidPort(String),

    #[error("destination key '{0}' has an empty host")]
    EmptyHost(String),

    #[error("destination key '{0}' uses a non-textual host, which has no textual form")]
    NonTextualHost(String),
}

impl FromStr for DestinationKey {
    type Err = KeyParseError;

    /// Parse the textual form `scheme://host:port`
    ///
    /// Only textual hosts are parseable; local-socket keys have no config
    /// representation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| KeyParseError::MissingScheme(s.to_string()))?;

        let scheme = match scheme {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(KeyParseError::UnknownScheme(other.to_string())),
        };

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| KeyParseError::MissingPort(s.to_string()))?;

        if host.is_empty() {
            return Err(KeyParseError::EmptyHost(s.to_string()));
        }

        // The display form of a local-socket key is bracketed; it must not
        // round-trip into a textual host.
        if host.starts_with('[') {
            return Err(KeyParseError::NonTextualHost(s.to_string()));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| KeyParseError::InvalidPort(s.to_string()))?;

        Ok(DestinationKey::new(scheme, host, port))
    }
}
