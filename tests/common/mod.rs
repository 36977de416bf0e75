//! Shared utilities for integration tests.

use std::net::SocketAddr;

use grpc_hello::config::{KeepaliveConfig, ServerConfig};
use grpc_hello::lifecycle::resolve_hostname;
use grpc_hello::net::{ConnectionTracker, Listener};
use grpc_hello::{RpcServer, Shutdown};
use tonic::transport::{Channel, Endpoint};
use tonic_health::pb::health_client::HealthClient;

/// A server running on an ephemeral loopback port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub hostname: String,
    pub connections: ConnectionTracker,
    shutdown: Shutdown,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the RPC server on 127.0.0.1:0 with the given keepalive settings.
#[allow(dead_code)]
pub async fn start_server(keepalive: KeepaliveConfig) -> TestServer {
    let hostname = resolve_hostname().unwrap();
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        bind_address: addr.to_string(),
        keepalive,
    };
    let server = RpcServer::new(&config, &hostname).unwrap();
    let connections = server.connection_tracker();

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run_until(listener, stop).await;
    });

    TestServer {
        addr,
        hostname,
        connections,
        shutdown,
    }
}

/// Connect a health client to `addr`.
#[allow(dead_code)]
pub async fn health_client(addr: SocketAddr) -> HealthClient<Channel> {
    let channel = Endpoint::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    HealthClient::new(channel)
}
