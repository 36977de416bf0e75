//! End-to-end tests of the health contract against a running server.

use std::time::Duration;

use grpc_hello::config::{ClientConfig, KeepaliveConfig};
use grpc_hello::health::{Poller, HOSTNAME_HEADER};
use grpc_hello::rpc::dial;
use grpc_hello::Shutdown;
use tokio::sync::mpsc;
use tonic::Code;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::HealthCheckRequest;

mod common;

#[tokio::test]
async fn check_returns_serving_with_server_hostname() {
    let server = common::start_server(KeepaliveConfig::default()).await;
    let mut client = common::health_client(server.addr).await;

    let response = client.check(HealthCheckRequest::default()).await.unwrap();

    let hostname = response
        .metadata()
        .get(HOSTNAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(hostname.as_deref(), Some(server.hostname.as_str()));
    assert_eq!(response.into_inner().status, ServingStatus::Serving as i32);
}

#[tokio::test]
async fn watch_is_rejected_promptly() {
    let server = common::start_server(KeepaliveConfig::default()).await;
    let mut client = common::health_client(server.addr).await;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.watch(HealthCheckRequest {
            service: "anything".into(),
        }),
    )
    .await
    .expect("watch must not hang");

    match result {
        Ok(_) => panic!("watch must not open a stream"),
        Err(status) => assert_eq!(status.code(), Code::Unimplemented),
    }
}

#[tokio::test]
async fn concurrent_checks_share_one_connection() {
    let server = common::start_server(KeepaliveConfig::default()).await;
    let client = common::health_client(server.addr).await;

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let mut client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.check(HealthCheckRequest::default()).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(server.connections.active_count(), 1);
}

#[tokio::test]
async fn poller_collects_successful_probes() {
    let server = common::start_server(KeepaliveConfig::default()).await;
    let channel = dial(&server.addr.to_string()).await.unwrap();

    let config = ClientConfig {
        target_address: server.addr.to_string(),
        interval: Duration::from_millis(100),
        ..ClientConfig::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let poller = Poller::new(channel, &config).with_outcomes(tx);
    let stats = poller.stats();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(poller.run(shutdown.subscribe()));
    tokio::time::sleep(Duration::from_millis(350)).await;
    shutdown.trigger();
    handle.await.unwrap();

    assert!(stats.dispatched() >= 3, "dispatched {}", stats.dispatched());

    let mut hostnames = Vec::new();
    while hostnames.len() < 3 {
        let outcome = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("probe result")
            .expect("sink open")
            .expect("probe succeeded");
        assert_eq!(outcome.status, ServingStatus::Serving);
        hostnames.push(outcome.hostname.unwrap());
    }
    assert!(hostnames.iter().all(|h| *h == server.hostname));
}

#[tokio::test]
async fn poller_keeps_cadence_over_a_run() {
    let server = common::start_server(KeepaliveConfig::default()).await;
    let channel = dial(&server.addr.to_string()).await.unwrap();

    let interval = Duration::from_millis(50);
    let run = Duration::from_millis(500);
    let config = ClientConfig {
        interval,
        ..ClientConfig::default()
    };
    let poller = Poller::new(channel, &config);
    let stats = poller.stats();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(poller.run(shutdown.subscribe()));
    tokio::time::sleep(run).await;
    shutdown.trigger();
    handle.await.unwrap();

    let expected = (run.as_millis() / interval.as_millis()) as u64;
    assert!(
        stats.dispatched() + 1 >= expected,
        "dispatched {} of {expected}",
        stats.dispatched()
    );
}

#[tokio::test]
async fn dial_fails_fast_without_server() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let result = tokio::time::timeout(Duration::from_secs(5), dial(&addr.to_string()))
        .await
        .expect("dial must not retry forever");
    assert!(result.is_err());
}
