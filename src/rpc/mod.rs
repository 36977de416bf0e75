//! RPC runtime subsystem.
//!
//! # Data Flow
//! ```text
//! Server mode (server.rs):
//!     Listener → per-connection task (net::connection)
//!     → trace layer → health + reflection routes
//!
//! Client mode (client.rs):
//!     dial target → Channel → health::poller
//! ```

pub mod client;
pub mod server;

pub use client::{dial, DialError};
pub use server::{build_service, RpcServer, RpcService, ServeError};
