//! Command-line surface.
//!
//! Flags override values from the optional config file, which in turn
//! override the built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{load_config, validate_config, AppConfig, ConfigError};

/// Which half of the pair this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Server,
    Client,
}

#[derive(Debug, Parser)]
#[command(name = "grpc-hello")]
#[command(about = "gRPC health-check server and polling client", long_about = None)]
pub struct Cli {
    /// Whether to start the gRPC server or the gRPC client
    #[arg(long)]
    pub client: bool,

    /// tcp host:port to connect or serve [default: 0.0.0.0:8888]
    #[arg(long)]
    pub addr: Option<String>,

    /// The interval time to request to the server [default: 3s]
    #[arg(long = "client.interval", value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Upper bound on concurrently outstanding probes (default: unbounded)
    #[arg(long = "client.max-in-flight")]
    pub max_in_flight: Option<usize>,

    /// How long to wait for in-flight probes on shutdown (default: 0, abandon them)
    #[arg(long = "client.shutdown-grace", value_parser = parse_duration)]
    pub shutdown_grace: Option<Duration>,

    /// Close a connection after it has had no outstanding RPCs for this long (default: infinity)
    #[arg(long = "server.max-connection-idle", value_parser = parse_duration)]
    pub max_connection_idle: Option<Duration>,

    /// Maximum amount of time a connection may exist before it is closed by sending a GOAWAY (default: infinity)
    #[arg(long = "server.max-connection-age", value_parser = parse_duration)]
    pub max_connection_age: Option<Duration>,

    /// Additive period after the GOAWAY after which the connection is forcibly closed (default: infinity)
    #[arg(long = "server.max-connection-age-grace", value_parser = parse_duration)]
    pub max_connection_age_grace: Option<Duration>,

    /// Optional TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset [default: info]
    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.client {
            Mode::Client
        } else {
            Mode::Server
        }
    }

    /// Build the validated configuration for this invocation.
    pub fn to_config(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => AppConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(&self, config: &mut AppConfig) {
        if let Some(addr) = &self.addr {
            config.server.bind_address = addr.clone();
            config.client.target_address = addr.clone();
        }
        if let Some(interval) = self.interval {
            config.client.interval = interval;
        }
        if let Some(limit) = self.max_in_flight {
            config.client.max_in_flight = Some(limit);
        }
        if let Some(grace) = self.shutdown_grace {
            config.client.shutdown_grace = grace;
        }

        let keepalive = &mut config.server.keepalive;
        if let Some(idle) = self.max_connection_idle {
            keepalive.max_connection_idle = idle;
        }
        if let Some(age) = self.max_connection_age {
            keepalive.max_connection_age = age;
        }
        if let Some(grace) = self.max_connection_age_grace {
            keepalive.max_connection_age_grace = grace;
        }

        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

/// Parse "100ms", "3s", "1m30s". A bare "0" means zero.
pub fn parse_duration(raw: &str) -> Result<Duration, humantime::DurationError> {
    let raw = raw.trim();
    if raw == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(raw)
}
