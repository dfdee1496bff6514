//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request interceptor / lifecycle code produce:
//!     → logging.rs (single-line JSON records on stdout)
//!     → layer.rs   (tracing events rendered through the same logger)
//!     → metrics.rs (request counter, latency histogram)
//!     → tracing.rs (request spans exported over OTLP)
//!
//! Consumers:
//!     → Log collection (stdout)
//!     → Metrics endpoint (Prometheus scrape of GET /metrics)
//!     → OpenTelemetry collector (OTLP/gRPC)
//! ```
//!
//! # Design Decisions
//! - Logger and metrics recorder are owned handles passed to request paths
//! - Telemetry failures never fail a request
//! - A telemetry channel that fails to start is logged once and skipped

pub mod layer;
pub mod logging;
pub mod metrics;
pub mod tracing;

use thiserror::Error;

pub use self::layer::JsonLogLayer;
pub use self::logging::{Fields, Level, LogEvent, LogSink, Logger, MemorySink, StdoutSink};
pub use self::metrics::{MetricSample, MetricsRecorder};
pub use self::tracing::{init_telemetry, TelemetryGuard};

/// Errors raised while starting a telemetry channel.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// Failed to build the OTLP span exporter.
    #[error("failed to build OTLP exporter: {0}")]
    OtlpExporter(#[from] opentelemetry_otlp::ExporterBuildError),

    /// Failed to install the global tracing subscriber.
    #[error("failed to initialize tracing subscriber: {0}")]
    TracingSubscriber(#[from] tracing_subscriber::util::TryInitError),

    /// Invalid metrics exporter settings.
    #[error("failed to build metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
