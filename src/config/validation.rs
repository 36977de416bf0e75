//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses are well-formed socket addresses
//! - Validate value ranges (poll interval > 0, in-flight bound > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is handed to the server or the poller

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid host:port socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("client.interval must be greater than zero")]
    ZeroInterval,

    #[error("client.max_in_flight must be greater than zero when set")]
    ZeroInFlightBound,

    #[error("observability.log_level must not be empty")]
    EmptyLogLevel,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("server.bind_address", &config.server.bind_address, &mut errors);
    check_address("client.target_address", &config.client.target_address, &mut errors);

    if config.client.interval.is_zero() {
        errors.push(ValidationError::ZeroInterval);
    }
    if config.client.max_in_flight == Some(0) {
        errors.push(ValidationError::ZeroInFlightBound);
    }
    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::EmptyLogLevel);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
