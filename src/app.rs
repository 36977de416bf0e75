//! Process entry points for the two modes.

use std::future::Future;
use std::io;

use thiserror::Error;
use tonic::transport::Channel;

use crate::config::{ClientConfig, ServerConfig};
use crate::health::Poller;
use crate::lifecycle::signals::{trigger_on, wait_for_interrupt};
use crate::lifecycle::{resolve_hostname, Shutdown, StartupError};
use crate::net::Listener;
use crate::rpc::{dial, RpcServer, ServeError};

/// Anything that ends the process with a non-zero status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("serve loop failed: {0}")]
    Serve(#[from] ServeError),

    #[error("interrupt handling failed: {0}")]
    Signal(#[from] io::Error),
}

/// Resolve identity, bind, and serve until a fatal error.
pub async fn run_server(config: &ServerConfig) -> Result<(), AppError> {
    let hostname = resolve_hostname()?;
    let listener = Listener::bind(&config.bind_address)
        .await
        .map_err(StartupError::from)?;
    let server = RpcServer::new(config, &hostname)?;

    server.run(listener).await?;
    Ok(())
}

/// Dial the target and poll it until the interrupt signal arrives.
pub async fn run_client(config: &ClientConfig) -> Result<(), AppError> {
    let channel = dial(&config.target_address)
        .await
        .map_err(StartupError::from)?;
    poll_until(channel, config, wait_for_interrupt()).await
}

/// Poll over `channel` until `stop` resolves.
///
/// An error from `stop` still ends polling, then fails the run.
pub async fn poll_until<F>(channel: Channel, config: &ClientConfig, stop: F) -> Result<(), AppError>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    let shutdown = Shutdown::new();
    let poller = Poller::new(channel, config);
    let stopped = shutdown.subscribe();
    let trigger = trigger_on(shutdown, stop);

    poller.run(stopped).await;
    match trigger.await {
        Ok(result) => result?,
        Err(e) => return Err(io::Error::other(e).into()),
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
