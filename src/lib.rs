//! gRPC health-check endpoint pair.
//!
//! # Architecture Overview
//!
//! ```text
//!   server mode                                   client mode
//!  ┌──────────────────────────────────┐          ┌──────────────────────────┐
//!  │ lifecycle::startup (hostname)    │          │ rpc::client::dial        │
//!  │ net::listener (bind, accept)     │          │        │                 │
//!  │        │                         │  Check   │        ▼                 │
//!  │        ▼                         │◀─────────┼─ health::poller (ticker, │
//!  │ net::connection (HTTP/2, policy) │          │   one task per probe)    │
//!  │        │        ▲                │─────────▶│        │                 │
//!  │        ▼        │ keepalive      │ SERVING  │        ▼                 │
//!  │ rpc::server → health::responder  │ hostname │ lifecycle::signals       │
//!  └──────────────────────────────────┘          └──────────────────────────┘
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;

pub use config::AppConfig;
pub use health::{HealthResponder, Poller};
pub use lifecycle::Shutdown;
pub use rpc::RpcServer;
