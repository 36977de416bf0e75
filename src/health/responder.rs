//! Health responder: answers `grpc.health.v1.Health` queries for this process.
//!
//! # Responsibilities
//! - `Check`: always SERVING, tagged with a `hostname` response header
//! - `Watch`: explicitly unsupported
//!
//! # Design Decisions
//! - Stateless per call; the only state is the hostname captured at startup
//! - The header value is validated once at construction so `Check` cannot fail

use futures_util::stream;
use thiserror::Error;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::{Request, Response, Status};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};

/// Response header carrying the responder's hostname.
pub const HOSTNAME_HEADER: &str = "hostname";

/// Message returned by `Watch`.
pub const WATCH_UNIMPLEMENTED: &str = "watch is not implemented.";

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("hostname '{0}' cannot be sent as a response header")]
    InvalidHostname(String),
}

/// Liveness responder for exactly this process.
#[derive(Debug, Clone)]
pub struct HealthResponder {
    hostname: String,
    header: MetadataValue<Ascii>,
}

impl HealthResponder {
    pub fn new(hostname: impl Into<String>) -> Result<Self, ResponderError> {
        let hostname = hostname.into();
        let header = MetadataValue::try_from(hostname.as_str())
            .map_err(|_| ResponderError::InvalidHostname(hostname.clone()))?;
        Ok(Self { hostname, header })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Wrap the responder in its tonic service.
    pub fn into_service(self) -> HealthServer<Self> {
        HealthServer::new(self)
    }
}

#[tonic::async_trait]
impl Health for HealthResponder {
    type WatchStream = stream::Empty<Result<HealthCheckResponse, Status>>;

    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        tracing::debug!(service = %request.get_ref().service, "Health check");

        let mut response = Response::new(HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        });
        response
            .metadata_mut()
            .insert(HOSTNAME_HEADER, self.header.clone());
        Ok(response)
    }

    async fn watch(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        Err(Status::unimplemented(WATCH_UNIMPLEMENTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[tokio::test]
    async fn check_reports_serving_with_hostname() {
        let responder = HealthResponder::new("node-a").unwrap();
        let response = responder
            .check(Request::new(HealthCheckRequest::default()))
            .await
            .unwrap();

        assert_eq!(
            response.metadata().get(HOSTNAME_HEADER).unwrap().to_str().unwrap(),
            "node-a"
        );
        assert_eq!(response.get_ref().status, ServingStatus::Serving as i32);
    }

    #[tokio::test]
    async fn check_ignores_requested_service_name() {
        let responder = HealthResponder::new("node-a").unwrap();
        let response = responder
            .check(Request::new(HealthCheckRequest {
                service: "some.other.Service".into(),
            }))
            .await
            .unwrap();
        assert_eq!(response.get_ref().status, ServingStatus::Serving as i32);
    }

    #[tokio::test]
    async fn watch_is_unimplemented() {
        let responder = HealthResponder::new("node-a").unwrap();
        let status = match responder
            .watch(Request::new(HealthCheckRequest::default()))
            .await
        {
            Ok(_) => panic!("watch must not open a stream"),
            Err(status) => status,
        };
        assert_eq!(status.code(), Code::Unimplemented);
        assert_eq!(status.message(), WATCH_UNIMPLEMENTED);
    }

    #[test]
    fn rejects_hostname_unfit_for_headers() {
        let err = HealthResponder::new("bad\nhost").unwrap_err();
        assert!(matches!(err, ResponderError::InvalidHostname(_)));
    }
}
