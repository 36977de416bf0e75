//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to the configured IPv4 address
//! - Accept incoming TCP connections
//! - Classify accept failures so the serve loop can tell a dropped peer or
//!   descriptor exhaustion from a broken listener

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The address is not a valid host:port pair.
    #[error("Invalid address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    /// Only IPv4 endpoints are served.
    #[error("Address {0} is not an IPv4 address")]
    NotIpv4(SocketAddr),

    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(std::io::Error),

    /// The peer went away before its connection was accepted.
    #[error("Connection dropped during accept: {0}")]
    AcceptAborted(std::io::Error),

    /// Out of descriptors or buffers; accepting may succeed later.
    #[error("Accept resources exhausted: {0}")]
    AcceptExhausted(std::io::Error),

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(std::io::Error),
}

impl ListenerError {
    /// True when the listener itself is still usable.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::AcceptAborted(_) | Self::AcceptExhausted(_))
    }
}

/// An IPv4 TCP listener owned by the server runtime.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `address` (host:port). Port 0 picks an ephemeral port.
    pub async fn bind(address: &str) -> Result<Self, ListenerError> {
        let addr: SocketAddr = address.parse().map_err(|source| ListenerError::InvalidAddress {
            address: address.to_string(),
            source,
        })?;
        if !addr.is_ipv4() {
            return Err(ListenerError::NotIpv4(addr));
        }

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner: listener })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(accept_failure)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

fn accept_failure(e: io::Error) -> ListenerError {
    if matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    ) {
        ListenerError::AcceptAborted(e)
    } else if e.kind() == io::ErrorKind::OutOfMemory || out_of_descriptors(&e) {
        ListenerError::AcceptExhausted(e)
    } else {
        ListenerError::Accept(e)
    }
}

#[cfg(unix)]
fn out_of_descriptors(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn out_of_descriptors(_e: &io::Error) -> bool {
    false
}
