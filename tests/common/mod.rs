//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use rust_service::config::ServiceConfig;
use rust_service::http::ServiceServer;
use rust_service::observability::metrics::{DEFAULT_DURATION_BUCKETS, HTTP_REQUESTS_TOTAL};
use rust_service::observability::{Level, Logger, MemorySink, MetricsRecorder};

pub const PEER: &str = "192.0.2.10:51515";

/// Telemetry handles whose output can be inspected.
pub struct Captured {
    pub logger: Logger,
    pub sink: MemorySink,
    pub metrics: MetricsRecorder,
}

impl Captured {
    pub fn new() -> Self {
        let sink = MemorySink::new();
        let logger = Logger::with_sink("rust-service", Level::Debug, Arc::new(sink.clone()));
        let metrics = MetricsRecorder::new(&DEFAULT_DURATION_BUCKETS).unwrap();
        Self { logger, sink, metrics }
    }

    pub fn server(&self) -> ServiceServer {
        ServiceServer::new(test_config(), self.logger.clone(), self.metrics.clone())
    }

    /// Log records carrying the given message.
    pub fn records(&self, message: &str) -> Vec<Value> {
        self.sink
            .records()
            .into_iter()
            .filter(|r| r["message"] == message)
            .collect()
    }

    pub fn requests_total(&self, method: &str, endpoint: &str, status: &str) -> u64 {
        counter_value(
            &self.metrics.render(),
            HTTP_REQUESTS_TOTAL,
            &[("method", method), ("endpoint", endpoint), ("status", status)],
        )
        .unwrap_or(0)
    }
}

/// Value of one counter series in exposition text. `labels` are given in
/// recording order; values are escaped the way the exporter writes them.
pub fn counter_value(rendered: &str, name: &str, labels: &[(&str, &str)]) -> Option<u64> {
    let label_text = labels
        .iter()
        .map(|(k, v)| {
            let escaped = v
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            format!("{k}=\"{escaped}\"")
        })
        .collect::<Vec<_>>()
        .join(",");
    let prefix = format!("{name}{{{label_text}}} ");
    rendered
        .lines()
        .find_map(|line| line.strip_prefix(&prefix))
        .and_then(|value| value.trim().parse::<f64>().ok())
        .map(|value| value as u64)
}

pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.tracing.enabled = false;
    config
}

pub fn get(uri: &str) -> Request<Body> {
    let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo::<SocketAddr>(PEER.parse().unwrap()));
    request
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
