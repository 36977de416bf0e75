//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve process identity (hostname) before anything is served
//! - Classify startup failures, all of which are fatal
//!
//! # Design Decisions
//! - Fail fast: any startup error terminates the process with a non-zero status
//! - Identity is captured once; responders never look it up per request

use sysinfo::System;
use thiserror::Error;

use crate::health::responder::ResponderError;
use crate::net::ListenerError;
use crate::rpc::client::DialError;

/// Conditions that make the process unable to fulfil its contract.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to resolve local hostname")]
    Hostname,

    #[error(transparent)]
    Responder(#[from] ResponderError),

    #[error("failed to build reflection service: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Dial(#[from] DialError),
}

/// Resolve this machine's hostname.
pub fn resolve_hostname() -> Result<String, StartupError> {
    match System::host_name() {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(StartupError::Hostname),
    }
}
