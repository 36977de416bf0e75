//! Client-side connection setup.

use thiserror::Error;
use tonic::transport::{Channel, Endpoint};

/// Failure to establish the initial connection. Fatal: there is no retry.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid target '{target}': {source}")]
    InvalidTarget {
        target: String,
        source: tonic::transport::Error,
    },

    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: tonic::transport::Error,
    },
}

/// Dial `target` (host:port) and wait until the connection is established.
///
/// The returned channel is cheap to clone; clones multiplex requests over
/// the same underlying connection.
pub async fn dial(target: &str) -> Result<Channel, DialError> {
    let endpoint = Endpoint::from_shared(format!("http://{target}")).map_err(|source| {
        DialError::InvalidTarget {
            target: target.to_string(),
            source,
        }
    })?;

    let channel = endpoint.connect().await.map_err(|source| DialError::Connect {
        target: target.to_string(),
        source,
    })?;

    tracing::info!(target = %target, "Connected to server");
    Ok(channel)
}
