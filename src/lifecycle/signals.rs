//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for the interrupt signal (Ctrl+C / SIGINT)
//! - Translate it into the internal shutdown broadcast
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Only the polling client listens; the server has no graceful shutdown path

use std::future::Future;
use std::io;

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Wait for the interrupt signal.
pub async fn wait_for_interrupt() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt signal received");
    Ok(())
}

/// Trigger `shutdown` once `signal` resolves.
///
/// If waiting fails the shutdown still fires, since the loop would otherwise
/// be impossible to stop, and the error is handed back through the task.
pub fn trigger_on<F>(shutdown: Shutdown, signal: F) -> JoinHandle<io::Result<()>>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let result = signal.await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "Failed to install interrupt handler");
        }
        shutdown.trigger();
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_triggers_shutdown() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        let handle = trigger_on(shutdown, async { Ok(()) });
        rx.recv().await.unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn handler_failure_still_stops_and_is_reported() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        let handle = trigger_on(shutdown, async { Err(io::Error::other("no signal handler")) });
        rx.recv().await.unwrap();
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "no signal handler");
    }
}
