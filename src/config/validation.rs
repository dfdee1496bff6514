//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, buckets ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::observability::Level;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("service.{0} must not be empty")]
    EmptyServiceField(&'static str),

    #[error("observability.log_level `{0}` is not one of debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("observability.duration_buckets must not be empty")]
    EmptyBuckets,

    #[error("observability.duration_buckets must be finite and strictly increasing")]
    UnorderedBuckets,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("tracing.otlp_endpoint must be set when tracing is enabled")]
    MissingOtlpEndpoint,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let identity = &config.service;
    for (field, value) in [
        ("name", &identity.name),
        ("health_name", &identity.health_name),
        ("display_name", &identity.display_name),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceField(field));
        }
    }

    if config.observability.log_level.parse::<Level>().is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    let buckets = &config.observability.duration_buckets;
    if buckets.is_empty() {
        errors.push(ValidationError::EmptyBuckets);
    } else if buckets.iter().any(|b| !b.is_finite())
        || buckets.windows(2).any(|pair| pair[0] >= pair[1])
    {
        errors.push(ValidationError::UnorderedBuckets);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.tracing.enabled && config.tracing.otlp_endpoint.trim().is_empty() {
        errors.push(ValidationError::MissingOtlpEndpoint);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
