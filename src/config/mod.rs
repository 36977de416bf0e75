//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (AppConfig::default)
//!     → optional config file (loader.rs, TOML)
//!     → command-line overrides (cli.rs)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → passed by reference into RpcServer / Poller constructors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once built; there is no process-wide mutable state
//! - All fields have defaults so an empty file (or no file) is valid
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, ClientConfig, KeepaliveConfig, ObservabilityConfig, ServerConfig};
pub use validation::{validate_config, ValidationError};
