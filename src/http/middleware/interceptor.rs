//! Request logging and metrics middleware.
//!
//! Every request produces, in order:
//! 1. an INFO `Incoming HTTP request` record
//! 2. the downstream handler call
//! 3. an `HTTP request completed` record whose level follows the status
//! 4. one counter increment and one histogram observation
//!
//! The completion record and the metric sample are built from the same
//! values, so log and metric labels always agree.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::observability::tracing::{record_response, request_span};
use crate::observability::{Fields, Level, Logger, MetricSample, MetricsRecorder};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

const UNKNOWN_ADDR: &str = "unknown";

/// Request data captured on entry and consumed on completion.
#[derive(Debug)]
pub struct RequestContext {
    pub remote_addr: String,
    pub method: String,
    pub path: String,
    pub user_agent: String,
    start: Instant,
}

impl RequestContext {
    pub fn capture(request: &Request) -> Self {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self {
            remote_addr: remote_addr(request.headers(), peer),
            method: request.method().as_str().to_string(),
            path: request.uri().path().to_string(),
            user_agent: request
                .headers()
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the peer socket address, else `"unknown"`.
pub fn remote_addr(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = header_value(headers, X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header_value(headers, X_REAL_IP) {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.to_string())
        .unwrap_or_else(|| UNKNOWN_ADDR.to_string())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Shared handle to the request telemetry pipeline.
#[derive(Debug, Clone)]
pub struct Interceptor {
    logger: Logger,
    metrics: MetricsRecorder,
}

impl Interceptor {
    /// Request records bypass the logger's minimum level: every request is
    /// logged on entry and on completion.
    pub fn new(logger: Logger, metrics: MetricsRecorder) -> Self {
        Self {
            logger: logger.unfiltered(),
            metrics,
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Capture the request context and log the incoming request.
    pub fn begin(&self, request: &Request) -> RequestContext {
        let ctx = RequestContext::capture(request);
        self.logger.info(
            "Incoming HTTP request",
            Fields::new()
                .with("remote_addr", ctx.remote_addr.as_str())
                .with("method", ctx.method.as_str())
                .with("path", ctx.path.as_str())
                .with("user_agent", ctx.user_agent.as_str()),
        );
        ctx
    }

    /// Log the completed request and record its metrics.
    pub fn finish(&self, ctx: RequestContext, status: StatusCode) {
        self.complete(ctx, status.as_u16());
    }

    fn complete(&self, ctx: RequestContext, status: u16) {
        let duration_seconds = ctx.elapsed().as_secs_f64();

        let mut fields = Fields::new()
            .with("remote_addr", ctx.remote_addr.as_str())
            .with("method", ctx.method.as_str())
            .with("path", ctx.path.as_str())
            .with("status", status);
        fields.insert_f64("duration_seconds", duration_seconds);
        self.logger
            .emit(Level::for_status(status), "HTTP request completed", fields);

        self.metrics.observe(&MetricSample::new(
            ctx.method,
            ctx.path,
            status,
            duration_seconds,
        ));
    }
}

/// Status recorded for a request whose future was dropped before a
/// response was produced (client went away, server shutting down).
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Completes an in-flight request exactly once, even if the request future
/// is dropped mid-handler.
struct InFlight<'a> {
    interceptor: &'a Interceptor,
    ctx: Option<RequestContext>,
}

impl InFlight<'_> {
    fn finish(mut self, status: StatusCode) {
        if let Some(ctx) = self.ctx.take() {
            self.interceptor.finish(ctx, status);
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.interceptor.complete(ctx, CLIENT_CLOSED_REQUEST);
        }
    }
}

/// Middleware wrapping a single request with the begin/finish contract.
pub async fn intercept(State(interceptor): State<Interceptor>, request: Request, next: Next) -> Response {
    let in_flight = InFlight {
        ctx: Some(interceptor.begin(&request)),
        interceptor: &interceptor,
    };
    let response = next.run(request).await;
    in_flight.finish(response.status());
    response
}

/// Wrap `router` with the request telemetry stack.
///
/// Layers, from the handler outwards: panic guard (500), request timeout
/// (504), interceptor, server span.
pub fn instrument(router: Router, interceptor: Interceptor, request_timeout: Duration) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            request_timeout,
        ))
        .layer(middleware::from_fn_with_state(interceptor, intercept))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(())
                .on_response(record_response)
                .on_failure(()),
        )
}
