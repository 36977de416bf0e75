//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → stdout, collected by whatever supervises the process
//! ```
//!
//! # Design Decisions
//! - Structured fields (connection_id, peer_addr, status) on every event
//! - No metrics or history are kept; logs are the only output

pub mod logging;

pub use logging::init_logging;
