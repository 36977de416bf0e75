//! Polling health client.
//!
//! # Responsibilities
//! - Probe one server on a fixed interval over a single shared connection
//! - Log every outcome; failed probes are observed, never retried
//! - Stop on the shutdown broadcast
//!
//! # Design Decisions
//! - Each tick spawns its own probe task, so a slow probe never delays the
//!   next tick and probes may overlap
//! - In-flight probes are unbounded unless `max_in_flight` is set
//! - On shutdown in-flight probes are abandoned unless a grace period is set

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;
use tonic::Status;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::config::ClientConfig;
use crate::health::responder::HOSTNAME_HEADER;

/// Result of one successful probe.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status: ServingStatus,
    /// Value of the `hostname` response header, if the server sent one.
    pub hostname: Option<String>,
    /// All response header metadata.
    pub metadata: MetadataMap,
    pub latency: Duration,
}

/// Issue a single health check over `client`.
pub async fn probe(client: &mut HealthClient<Channel>) -> Result<ProbeOutcome, Status> {
    let started = Instant::now();
    let response = client.check(HealthCheckRequest::default()).await?;
    let latency = started.elapsed();

    let metadata = response.metadata().clone();
    let hostname = metadata
        .get(HOSTNAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let status = ServingStatus::try_from(response.into_inner().status).unwrap_or(ServingStatus::Unknown);

    Ok(ProbeOutcome {
        status,
        hostname,
        metadata,
        latency,
    })
}

/// Probe counters, readable while the poller runs.
#[derive(Debug, Default)]
pub struct PollStats {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl PollStats {
    /// Probes started.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Probes that returned a response.
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Probes that returned an error.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Ticks dropped because the in-flight bound was reached.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// Periodic prober for a single server.
pub struct Poller {
    client: HealthClient<Channel>,
    interval: Duration,
    max_in_flight: Option<usize>,
    in_flight: Option<Arc<Semaphore>>,
    shutdown_grace: Duration,
    stats: Arc<PollStats>,
    outcomes: Option<mpsc::UnboundedSender<Result<ProbeOutcome, Status>>>,
}

impl Poller {
    pub fn new(channel: Channel, config: &ClientConfig) -> Self {
        Self {
            client: HealthClient::new(channel),
            interval: config.interval,
            max_in_flight: config.max_in_flight,
            in_flight: config.max_in_flight.map(|limit| Arc::new(Semaphore::new(limit))),
            shutdown_grace: config.shutdown_grace,
            stats: Arc::new(PollStats::default()),
            outcomes: None,
        }
    }

    /// Also deliver every probe result to `sink`.
    pub fn with_outcomes(mut self, sink: mpsc::UnboundedSender<Result<ProbeOutcome, Status>>) -> Self {
        self.outcomes = Some(sink);
        self
    }

    pub fn stats(&self) -> Arc<PollStats> {
        Arc::clone(&self.stats)
    }

    /// Poll until `shutdown` fires, then release the connection.
    ///
    /// Panics if the configured interval is zero; validated configs never are.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            max_in_flight = ?self.max_in_flight,
            "Health poller starting"
        );

        // First probe one interval after start, like a plain ticker.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut probes = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => self.dispatch(&mut probes),
                _ = shutdown.recv() => {
                    tracing::info!("Health poller received shutdown signal, exiting loop");
                    break;
                }
                Some(joined) = probes.join_next(), if !probes.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Probe task failed");
                    }
                }
            }
        }

        drop(ticker);
        self.finish(probes).await;
        tracing::info!(
            dispatched = self.stats.dispatched(),
            succeeded = self.stats.succeeded(),
            failed = self.stats.failed(),
            skipped = self.stats.skipped(),
            "Health poller stopped"
        );
    }

    fn dispatch(&self, probes: &mut JoinSet<()>) {
        let permit = match &self.in_flight {
            Some(limit) => match Arc::clone(limit).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        max_in_flight = ?self.max_in_flight,
                        "In-flight probe limit reached, skipping tick"
                    );
                    return;
                }
            },
            None => None,
        };

        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        let mut client = self.client.clone();
        let stats = Arc::clone(&self.stats);
        let outcomes = self.outcomes.clone();

        probes.spawn(async move {
            let _permit = permit;
            let result = probe(&mut client).await;
            match &result {
                Ok(outcome) => {
                    stats.succeeded.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        status = ?outcome.status,
                        hostname = outcome.hostname.as_deref().unwrap_or(""),
                        header = ?outcome.metadata,
                        latency_ms = outcome.latency.as_millis() as u64,
                        "Health check response"
                    );
                }
                Err(status) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        code = ?status.code(),
                        error = %status.message(),
                        "Health check failed"
                    );
                }
            }
            if let Some(sink) = outcomes {
                let _ = sink.send(result);
            }
        });
    }

    async fn finish(&self, mut probes: JoinSet<()>) {
        if probes.is_empty() {
            return;
        }
        if self.shutdown_grace.is_zero() {
            tracing::debug!(abandoned = probes.len(), "Leaving in-flight probes behind");
            probes.detach_all();
            return;
        }

        let drained = time::timeout(self.shutdown_grace, async {
            while probes.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                abandoned = probes.len(),
                grace = ?self.shutdown_grace,
                "In-flight probes outlived the shutdown grace period"
            );
            probes.detach_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use tokio::net::TcpListener;
    use tonic::transport::Endpoint;

    /// A channel to an address that accepts TCP but never speaks HTTP/2,
    /// so every probe stays in flight.
    async fn stalled_channel() -> (Channel, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let channel = Endpoint::from_shared(format!("http://{addr}"))
            .unwrap()
            .connect_lazy();
        (channel, listener)
    }

    /// A channel to a port nothing listens on, so every probe fails.
    async fn refused_channel() -> Channel {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        Endpoint::from_shared(format!("http://127.0.0.1:{port}"))
            .unwrap()
            .connect_lazy()
    }

    fn client_config(interval_ms: u64) -> ClientConfig {
        ClientConfig {
            interval: Duration::from_millis(interval_ms),
            ..ClientConfig::default()
        }
    }

    async fn run_for(poller: Poller, duration: Duration) {
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(poller.run(shutdown.subscribe()));
        tokio::time::sleep(duration).await;
        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn failed_probes_do_not_stop_polling() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = Poller::new(refused_channel().await, &client_config(30)).with_outcomes(tx);
        let stats = poller.stats();

        run_for(poller, Duration::from_millis(250)).await;

        assert!(stats.dispatched() >= 4, "dispatched {}", stats.dispatched());
        assert_eq!(stats.succeeded(), 0);

        let first = rx.recv().await.unwrap();
        assert!(first.is_err());
        assert!(stats.failed() >= 1);
    }

    #[tokio::test]
    async fn first_probe_waits_one_interval() {
        let poller = Poller::new(refused_channel().await, &client_config(10_000));
        let stats = poller.stats();

        run_for(poller, Duration::from_millis(100)).await;

        assert_eq!(stats.dispatched(), 0);
    }

    #[tokio::test]
    async fn slow_probes_overlap_when_unbounded() {
        let (channel, _listener) = stalled_channel().await;
        let poller = Poller::new(channel, &client_config(20));
        let stats = poller.stats();

        run_for(poller, Duration::from_millis(200)).await;

        assert!(stats.dispatched() >= 4, "dispatched {}", stats.dispatched());
        assert_eq!(stats.succeeded() + stats.failed(), 0);
        assert_eq!(stats.skipped(), 0);
    }

    #[tokio::test]
    async fn in_flight_bound_skips_ticks() {
        let (channel, _listener) = stalled_channel().await;
        let config = ClientConfig {
            max_in_flight: Some(2),
            ..client_config(20)
        };
        let poller = Poller::new(channel, &config);
        let stats = poller.stats();

        run_for(poller, Duration::from_millis(200)).await;

        assert_eq!(stats.dispatched(), 2);
        assert!(stats.skipped() >= 2, "skipped {}", stats.skipped());
    }

    #[tokio::test]
    async fn no_probes_after_shutdown() {
        let poller = Poller::new(refused_channel().await, &client_config(20));
        let stats = poller.stats();

        run_for(poller, Duration::from_millis(100)).await;
        let after_stop = stats.dispatched();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(stats.dispatched(), after_stop);
    }

    #[tokio::test]
    async fn shutdown_grace_bounds_the_wait() {
        let (channel, _listener) = stalled_channel().await;
        let config = ClientConfig {
            shutdown_grace: Duration::from_millis(150),
            ..client_config(20)
        };
        let poller = Poller::new(channel, &config);

        let shutdown = Shutdown::new();
        let handle = tokio::spawn(poller.run(shutdown.subscribe()));
        tokio::time::sleep(Duration::from_millis(70)).await;

        let stopped_at = Instant::now();
        shutdown.trigger();
        handle.await.unwrap();

        let waited = stopped_at.elapsed();
        assert!(waited >= Duration::from_millis(140), "waited {waited:?}");
        assert!(waited < Duration::from_secs(2), "waited {waited:?}");
    }
}
