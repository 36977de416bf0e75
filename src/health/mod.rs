//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Server side (responder.rs):
//!     Check → SERVING + hostname header
//!     Watch → Unimplemented
//!
//! Client side (poller.rs):
//!     Periodic timer
//!     → spawn probe (Check over the shared channel)
//!     → log outcome
//! ```
//!
//! # Design Decisions
//! - Point-in-time checks only; no streaming subscription
//! - Probe failures are logged, never acted upon

pub mod poller;
pub mod responder;

pub use poller::{probe, PollStats, Poller, ProbeOutcome};
pub use responder::{HealthResponder, ResponderError, HOSTNAME_HEADER};
