//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count requests by method, endpoint and status
//! - Record request latency distribution by method and endpoint
//! - Render the Prometheus text exposition format for `GET /metrics`
//!
//! # Metrics
//! - `http_requests_total` (counter): labels `method`, `endpoint`, `status`
//! - `http_request_duration_seconds` (histogram): labels `method`, `endpoint`
//!
//! # Design Decisions
//! - The recorder is owned by the service and handed to request paths;
//!   it is never installed as the process-global `metrics` recorder
//! - Updates are atomic inside the exporter and cannot fail the request
//! - Histogram buckets are fixed at construction and shared by all series

use std::fmt;
use std::sync::Arc;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use super::ObservabilityError;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Default latency buckets, in seconds.
pub const DEFAULT_DURATION_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// One completed request, as seen by the metrics pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub method: String,
    pub endpoint: String,
    pub status: String,
    pub duration_seconds: f64,
}

impl MetricSample {
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>, status: u16, duration_seconds: f64) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
            status: status.to_string(),
            duration_seconds,
        }
    }
}

struct Inner {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

/// Request counter and latency histogram backed by a Prometheus recorder.
///
/// Cloning is cheap; all clones update the same series.
#[derive(Clone)]
pub struct MetricsRecorder {
    inner: Option<Arc<Inner>>,
}

impl MetricsRecorder {
    /// Build a recorder whose duration histogram uses `buckets`.
    pub fn new(buckets: &[f64]) -> Result<Self, ObservabilityError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()), buckets)?
            .build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests");
            describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
        });

        Ok(Self {
            inner: Some(Arc::new(Inner { recorder, handle })),
        })
    }

    /// A recorder that drops every update and renders nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn record_request(&self, method: &str, endpoint: &str, status: &str) {
        let Some(inner) = &self.inner else {
            return;
        };
        metrics::with_local_recorder(&inner.recorder, || {
            counter!(
                HTTP_REQUESTS_TOTAL,
                "method" => method.to_string(),
                "endpoint" => endpoint.to_string(),
                "status" => status.to_string()
            )
            .increment(1);
        });
    }

    pub fn record_duration(&self, method: &str, endpoint: &str, duration_seconds: f64) {
        let Some(inner) = &self.inner else {
            return;
        };
        metrics::with_local_recorder(&inner.recorder, || {
            histogram!(
                HTTP_REQUEST_DURATION_SECONDS,
                "method" => method.to_string(),
                "endpoint" => endpoint.to_string()
            )
            .record(duration_seconds);
        });
    }

    /// Record both projections of a completed request.
    pub fn observe(&self, sample: &MetricSample) {
        self.record_request(&sample.method, &sample.endpoint, &sample.status);
        self.record_duration(&sample.method, &sample.endpoint, sample.duration_seconds);
    }

    /// Render the text exposition format.
    pub fn render(&self) -> String {
        self.inner
            .as_ref()
            .map(|inner| inner.handle.render())
            .unwrap_or_default()
    }

    /// Periodic housekeeping for histogram storage.
    pub fn run_upkeep(&self) {
        if let Some(inner) = &self.inner {
            inner.handle.run_upkeep();
        }
    }
}

impl fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
