//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for both process
//! modes. All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default address used both for binding (server) and dialing (client).
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:8888";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Server runtime settings.
    pub server: ServerConfig,

    /// Polling client settings.
    pub client: ClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Server runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,

    /// Per-connection keepalive enforcement.
    pub keepalive: KeepaliveConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_ADDRESS.to_string(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

/// Keepalive enforcement settings. A zero duration means "no limit".
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Close a connection after it had no outstanding RPCs for this long.
    #[serde(with = "humantime_duration")]
    pub max_connection_idle: Duration,

    /// Close a connection once it has existed for this long.
    #[serde(with = "humantime_duration")]
    pub max_connection_age: Duration,

    /// Additive period after a policy close is announced before the
    /// connection is forcibly dropped.
    #[serde(with = "humantime_duration")]
    pub max_connection_age_grace: Duration,
}

/// Polling client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address to dial.
    pub target_address: String,

    /// Time between two probes.
    #[serde(with = "humantime_duration")]
    pub interval: Duration,

    /// Upper bound on concurrently outstanding probes. Unbounded when unset.
    pub max_in_flight: Option<usize>,

    /// How long to wait for in-flight probes on shutdown. Zero abandons them.
    #[serde(with = "humantime_duration")]
    pub shutdown_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target_address: DEFAULT_ADDRESS.to_string(),
            interval: Duration::from_secs(3),
            max_in_flight: None,
            shutdown_grace: Duration::ZERO,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Serde adapter storing durations as human readable strings ("3s", "1m 30s").
mod humantime_duration {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}
