//! Connection state machine and lifecycle tracking.
//!
//! # Responsibilities
//! - Track connection state (Active → Draining → Closed)
//! - Generate unique connection IDs for tracing
//! - Count outstanding RPCs per connection
//! - Enforce the keepalive policy (GOAWAY, then hard close after grace)

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use http::{Request, Response};
use http_body::{Body, Frame, SizeHint};
use hyper::body::Incoming;
use hyper::server::conn::http2;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::net::keepalive::KeepalivePolicy;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is active and processing requests.
    Active,
    /// GOAWAY sent: no new RPCs, finishing in-flight ones.
    Draining,
    /// Connection is closed.
    Closed,
}

/// Why a served connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer hung up (or the connection failed) before any policy fired.
    PeerClosed,
    /// No outstanding RPCs for longer than the idle limit.
    Idle,
    /// Connection outlived its max age.
    MaxAge,
    /// In-flight RPCs did not finish within the grace period after GOAWAY.
    GraceExpired,
}

/// Counts live connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
            state: ConnectionState::Active,
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
    state: ConnectionState,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "Connection state change");
        self.state = next;
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.transition(ConnectionState::Closed);
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[derive(Debug, Clone, Copy)]
struct Activity {
    outstanding: usize,
    idle_since: Instant,
}

/// Outstanding-RPC bookkeeping for one connection.
///
/// Idleness is measured from the most recent moment the number of
/// outstanding RPCs dropped to zero, or from connection establishment.
#[derive(Debug, Clone)]
pub struct RpcActivity {
    tx: Arc<watch::Sender<Activity>>,
}

impl RpcActivity {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Activity {
            outstanding: 0,
            idle_since: Instant::now(),
        });
        Self { tx: Arc::new(tx) }
    }

    /// Mark an RPC as started. It stays outstanding until the guard drops.
    pub fn begin(&self) -> RpcGuard {
        self.tx.send_modify(|activity| activity.outstanding += 1);
        RpcGuard {
            tx: Arc::clone(&self.tx),
        }
    }

    /// Number of RPCs currently in flight.
    pub fn outstanding(&self) -> usize {
        self.tx.borrow().outstanding
    }

    /// Resolves once the connection has had no outstanding RPCs for `limit`.
    pub async fn idle_expired(&self, limit: Duration) {
        let mut rx = self.tx.subscribe();
        loop {
            let snapshot = *rx.borrow_and_update();
            if snapshot.outstanding == 0 {
                tokio::select! {
                    _ = tokio::time::sleep_until(snapshot.idle_since + limit) => return,
                    _ = rx.changed() => {}
                }
            } else {
                // The sender lives as long as `self`, so this cannot fail.
                let _ = rx.changed().await;
            }
        }
    }
}

impl Default for RpcActivity {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the lifetime of one RPC.
#[derive(Debug)]
pub struct RpcGuard {
    tx: Arc<watch::Sender<Activity>>,
}

impl Drop for RpcGuard {
    fn drop(&mut self) {
        self.tx.send_modify(|activity| {
            activity.outstanding = activity.outstanding.saturating_sub(1);
            if activity.outstanding == 0 {
                activity.idle_since = Instant::now();
            }
        });
    }
}

/// Tower middleware that counts an RPC from dispatch until its response
/// body is dropped.
#[derive(Debug, Clone)]
pub struct TrackRpcs<S> {
    inner: S,
    activity: RpcActivity,
}

impl<S> TrackRpcs<S> {
    pub fn new(inner: S, activity: RpcActivity) -> Self {
        Self { inner, activity }
    }
}

impl<S, ReqBody, ResBody> tower::Service<Request<ReqBody>> for TrackRpcs<S>
where
    S: tower::Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<TrackedBody<ResBody>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let guard = self.activity.begin();
        let response = self.inner.call(request);
        Box::pin(async move {
            let response = response.await?;
            Ok(response.map(|body| TrackedBody::new(body, guard)))
        })
    }
}

/// Response body that keeps its RPC counted until it is dropped.
pub struct TrackedBody<B> {
    inner: Pin<Box<B>>,
    _guard: RpcGuard,
}

impl<B> TrackedBody<B> {
    fn new(inner: B, guard: RpcGuard) -> Self {
        Self {
            inner: Box::pin(inner),
            _guard: guard,
        }
    }
}

impl<B: Body> Body for TrackedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut().inner.as_mut().poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

type HyperService<S> = TowerToHyperService<TrackRpcs<S>>;
type HyperFuture<S> = <HyperService<S> as hyper::service::Service<Request<Incoming>>>::Future;

/// Serve one accepted connection over HTTP/2 under the given keepalive policy.
///
/// Runs until the peer closes the connection or the policy recycles it:
/// GOAWAY is sent when the idle or age limit is reached, in-flight RPCs may
/// then drain for up to the grace period, after which the connection is dropped.
pub async fn serve_connection<S, B>(
    stream: TcpStream,
    service: S,
    policy: KeepalivePolicy,
    mut guard: ConnectionGuard,
) -> Result<CloseReason, hyper::Error>
where
    S: tower::Service<Request<Incoming>, Response = Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
    B: Body + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    TokioExecutor: hyper::rt::bounds::Http2ServerConnExec<HyperFuture<S>, TrackedBody<B>>,
{
    let activity = RpcActivity::new();
    let service = TowerToHyperService::new(TrackRpcs::new(service, activity.clone()));

    let connection = http2::Builder::new(TokioExecutor::new())
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let reason = tokio::select! {
        result = connection.as_mut() => {
            result?;
            return Ok(CloseReason::PeerClosed);
        }
        reason = policy_trigger(&policy, &activity) => reason,
    };

    tracing::debug!(
        connection_id = %guard.id(),
        reason = ?reason,
        outstanding = activity.outstanding(),
        "Sending GOAWAY"
    );
    guard.transition(ConnectionState::Draining);
    connection.as_mut().graceful_shutdown();

    match policy.max_age_grace {
        Some(grace) => match tokio::time::timeout(grace, connection.as_mut()).await {
            Ok(result) => {
                result?;
                Ok(reason)
            }
            Err(_) => {
                tracing::debug!(
                    connection_id = %guard.id(),
                    grace = ?grace,
                    outstanding = activity.outstanding(),
                    "Grace period expired, closing connection"
                );
                Ok(CloseReason::GraceExpired)
            }
        },
        None => {
            connection.await?;
            Ok(reason)
        }
    }
}

/// Resolves with the first policy limit a connection hits. Never resolves
/// for an unbounded policy.
async fn policy_trigger(policy: &KeepalivePolicy, activity: &RpcActivity) -> CloseReason {
    let age = async {
        match policy.age_deadline() {
            Some(deadline) => tokio::time::sleep(deadline).await,
            None => std::future::pending().await,
        }
    };
    let idle = async {
        match policy.max_idle {
            Some(limit) => activity.idle_expired(limit).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = age => CloseReason::MaxAge,
        _ = idle => CloseReason::Idle,
    }
}
