//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve hostname → Bind listener / dial target → Serve or poll
//!
//! Shutdown (shutdown.rs):
//!     Broadcast to the polling loop → stop ticker → close connection
//!
//! Signals (signals.rs):
//!     SIGINT → Trigger shutdown (client mode)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: identity first, then network
//! - Startup errors are fatal; there is no restart loop

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{resolve_hostname, StartupError};
