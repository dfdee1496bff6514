//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::observability::metrics::DEFAULT_DURATION_BUCKETS;

/// Root configuration for an instrumented service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service identity used in logs, traces and responses.
    pub service: ServiceIdentity,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// OpenTelemetry trace export settings.
    pub tracing: TracingConfig,
}

/// Names a service goes by.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceIdentity {
    /// Name in log records and the OpenTelemetry resource (e.g. "rust-service").
    pub name: String,

    /// Name reported by `GET /health` (e.g. "rust").
    pub health_name: String,

    /// Human-readable name used by `GET /` (e.g. "Rust").
    pub display_name: String,
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: "rust-service".to_string(),
            health_name: "rust".to_string(),
            display_name: "Rust".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Minimum log level (debug, info, warn, error).
    pub log_level: String,

    /// Enable the request counter and latency histogram.
    pub metrics_enabled: bool,

    /// Histogram buckets for `http_request_duration_seconds`, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            duration_buckets: DEFAULT_DURATION_BUCKETS.to_vec(),
        }
    }
}

/// OpenTelemetry trace export configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TracingConfig {
    /// Export request spans over OTLP.
    pub enabled: bool,

    /// Collector gRPC endpoint.
    pub otlp_endpoint: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: "http://otel-collector:4317".to_string(),
        }
    }
}
