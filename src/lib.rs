//! Instrumented HTTP service library.
//!
//! Implements the request telemetry convention shared by every service:
//! structured JSON logs, Prometheus metrics and OpenTelemetry traces.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::{Interceptor, ServiceServer};
pub use lifecycle::Shutdown;
pub use observability::{Fields, Level, Logger, MetricsRecorder};
