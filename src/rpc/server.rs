//! RPC server setup.
//!
//! # Responsibilities
//! - Register the health responder and the reflection service
//! - Wire up request tracing
//! - Accept connections and serve each under the keepalive policy
//!
//! There is no graceful shutdown on this path: the server runs until the
//! accept loop fails or the process is killed. Dropped peers and descriptor
//! exhaustion do not count as failures; the loop skips or backs off.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;
use tonic::service::{Routes, RoutesBuilder};
use tower::ServiceBuilder;
use tower_http::classify::{GrpcErrorsAsFailures, SharedClassifier};
use tower_http::trace::{Trace, TraceLayer};

use crate::config::ServerConfig;
use crate::health::responder::HealthResponder;
use crate::lifecycle::StartupError;
use crate::net::{serve_connection, ConnectionTracker, KeepalivePolicy, Listener, ListenerError};

/// First pause after the listener runs out of resources; doubles up to the max.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Traced health + reflection routes, cloned into every connection task.
pub type RpcService = Trace<Routes, SharedClassifier<GrpcErrorsAsFailures>>;

/// Build the routes served on every connection.
pub fn build_service(hostname: &str) -> Result<RpcService, StartupError> {
    let responder = HealthResponder::new(hostname)?;
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let mut routes = RoutesBuilder::default();
    routes.add_service(responder.into_service());
    routes.add_service(reflection);

    Ok(ServiceBuilder::new()
        .layer(TraceLayer::new_for_grpc())
        .service(routes.routes()))
}

/// Fatal failure of the serve loop.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// The health-check RPC server.
pub struct RpcServer {
    service: RpcService,
    policy: KeepalivePolicy,
    tracker: ConnectionTracker,
}

impl RpcServer {
    /// Build the server for `hostname` under the configured keepalive policy.
    pub fn new(config: &ServerConfig, hostname: &str) -> Result<Self, StartupError> {
        let service = build_service(hostname)?;
        let policy = KeepalivePolicy::from_config(&config.keepalive);
        tracing::info!(
            hostname = %hostname,
            max_connection_idle = ?policy.max_idle,
            max_connection_age = ?policy.max_age,
            max_connection_age_grace = ?policy.max_age_grace,
            "RPC server configured"
        );

        Ok(Self {
            service,
            policy,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Live connection counter, shared with the serving tasks.
    pub fn connection_tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Serve forever. Returns only when the listener is broken.
    pub async fn run(self, listener: Listener) -> Result<(), ServeError> {
        self.log_start(&listener);
        loop {
            let (stream, peer) = self.next_connection(&listener).await?;
            self.spawn_connection(stream, peer);
        }
    }

    /// Serve until `shutdown` fires. Connections already accepted keep
    /// running on their own tasks.
    pub async fn run_until(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServeError> {
        self.log_start(&listener);
        loop {
            tokio::select! {
                accepted = self.next_connection(&listener) => {
                    let (stream, peer) = accepted?;
                    self.spawn_connection(stream, peer);
                }
                _ = shutdown.recv() => {
                    tracing::info!("RPC server stopped accepting");
                    return Ok(());
                }
            }
        }
    }

    /// Accept the next connection, riding out transient accept failures.
    async fn next_connection(&self, listener: &Listener) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let mut backoff = ACCEPT_BACKOFF_MIN;
        loop {
            match listener.accept().await {
                Ok(accepted) => return Ok(accepted),
                Err(ListenerError::AcceptExhausted(e)) => {
                    tracing::warn!(error = %e, retry_in = ?backoff, "Accept failed, backing off");
                    time::sleep(backoff).await;
                    backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!(error = %e, "Skipping connection that failed during accept");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn log_start(&self, listener: &Listener) {
        match listener.local_addr() {
            Ok(addr) => tracing::info!(address = %addr, "Start listening the grpc server"),
            Err(e) => tracing::warn!(error = %e, "Listening, local address unavailable"),
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let guard = self.tracker.track();
        let connection_id = guard.id();
        let service = self.service.clone();
        let policy = self.policy;

        tracing::debug!(
            connection_id = %connection_id,
            peer_addr = %peer,
            active_connections = self.tracker.active_count(),
            "Serving connection"
        );

        tokio::spawn(async move {
            match serve_connection(stream, service, policy, guard).await {
                Ok(reason) => tracing::debug!(
                    connection_id = %connection_id,
                    peer_addr = %peer,
                    reason = ?reason,
                    "Connection finished"
                ),
                Err(e) => tracing::debug!(
                    connection_id = %connection_id,
                    peer_addr = %peer,
                    error = %e,
                    "Connection error"
                ),
            }
        });
    }
}
