//! Distributed tracing support.
//!
//! # Responsibilities
//! - Install the process `tracing` subscriber (filter + JSON log layer)
//! - Export request spans to the OpenTelemetry collector over OTLP/gRPC
//! - Extract W3C trace context from incoming requests
//!
//! # Design Decisions
//! - A collector that cannot be configured is logged once at ERROR and the
//!   service keeps running without traces
//! - Spans are created by `TraceLayer`; the built-in request/response events
//!   are disabled so the interceptor stays the only source of request logs

use std::fmt;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use opentelemetry::global;
use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_http::HeaderExtractor;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::layer::JsonLogLayer;
use super::logging::{Fields, Level, Logger};
use super::ObservabilityError;
use crate::config::ServiceConfig;

/// Keeps the tracer provider alive; flushes pending spans on shutdown.
#[derive(Default)]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("exporting", &self.is_exporting())
            .finish()
    }
}

impl TelemetryGuard {
    /// Whether spans are being exported.
    pub fn is_exporting(&self) -> bool {
        self.provider.is_some()
    }

    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Failed to flush trace exporter");
            }
        }
    }
}

/// Install the global subscriber and, when enabled, the OTLP trace pipeline.
pub fn init_telemetry(config: &ServiceConfig, logger: Logger) -> Result<TelemetryGuard, ObservabilityError> {
    let provider = if config.tracing.enabled {
        match build_tracer_provider(&config.service.name, &config.tracing.otlp_endpoint) {
            Ok(provider) => Some(provider),
            Err(e) => {
                logger.error(
                    "Failed to create OTLP trace exporter",
                    Fields::new().with("error", e.to_string()),
                );
                None
            }
        }
    } else {
        None
    };

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service.name.clone()))
    });

    let min_level: Level = config.observability.log_level.parse().unwrap_or(Level::Info);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_str().to_ascii_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(JsonLogLayer::new(logger.clone()))
        .with(otel_layer)
        .try_init()?;

    if let Some(provider) = &provider {
        global::set_tracer_provider(provider.clone());
        let propagators: Vec<Box<dyn TextMapPropagator + Send + Sync>> = vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ];
        global::set_text_map_propagator(TextMapCompositePropagator::new(propagators));
        logger.info(
            "OpenTelemetry SDK initialized",
            Fields::new().with("otlp_endpoint", config.tracing.otlp_endpoint.clone()),
        );
    }

    Ok(TelemetryGuard { provider })
}

fn build_tracer_provider(service_name: &str, endpoint: &str) -> Result<SdkTracerProvider, ObservabilityError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(normalize_endpoint(endpoint))
        .build()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// gRPC endpoints need a scheme; collector addresses are often given as
/// bare `host:port`.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

/// Server span for one request, parented on the caller's trace context.
pub fn request_span(request: &Request<Body>) -> Span {
    let method = request.method();
    let path = request.uri().path();
    let span = tracing::info_span!(
        "HTTP request",
        otel.name = %format!("{method} {path}"),
        otel.kind = "server",
        otel.status_code = tracing::field::Empty,
        http.request.method = %method,
        url.path = %path,
        http.response.status_code = tracing::field::Empty,
    );

    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    });
    let _ = span.set_parent(parent);
    span
}

/// Attach the response status to the request span.
pub fn record_response(response: &Response<Body>, _latency: Duration, span: &Span) {
    let status = response.status();
    span.record("http.response.status_code", status.as_u16());
    if status.is_server_error() {
        span.record("otel.status_code", "ERROR");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_endpoints_get_http_scheme() {
        assert_eq!(normalize_endpoint("otel-collector:4317"), "http://otel-collector:4317");
        assert_eq!(normalize_endpoint(" http://localhost:4317 "), "http://localhost:4317");
        assert_eq!(normalize_endpoint("https://collector.example:443"), "https://collector.example:443");
    }

    #[test]
    fn request_span_is_created_without_a_subscriber() {
        let request = Request::builder()
            .uri("/health")
            .header("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
            .body(Body::empty())
            .unwrap();
        let span = request_span(&request);
        let response = Response::builder().status(503).body(Body::empty()).unwrap();
        record_response(&response, Duration::from_millis(1), &span);
    }
}
