//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop)
//!     → connection.rs (HTTP/2 serving, RPC accounting, state machine)
//!     → keepalive.rs decides when the connection is recycled
//!     → Hand off to the RPC routes
//!
//! Connection States:
//!     Active → Draining (GOAWAY sent) → Closed
//! ```
//!
//! # Design Decisions
//! - Each connection is served on its own task
//! - Keepalive limits are enforced per connection, not by a global sweeper
//! - A zero keepalive setting never becomes a zero-length limit

pub mod connection;
pub mod keepalive;
pub mod listener;

pub use connection::{serve_connection, CloseReason, ConnectionTracker};
pub use keepalive::KeepalivePolicy;
pub use listener::{Listener, ListenerError};
