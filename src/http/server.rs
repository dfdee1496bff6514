//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request telemetry, timeout, panic guard, spans)
//! - Bind server to listener with peer addresses
//! - Drive periodic metrics upkeep
//! - Stop on the shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::{ServiceConfig, ServiceIdentity};
use crate::http::handlers;
use crate::http::middleware::{instrument, Interceptor};
use crate::observability::{Fields, Logger, MetricsRecorder};

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<ServiceIdentity>,
    pub metrics: MetricsRecorder,
}

/// HTTP server for an instrumented service.
pub struct ServiceServer {
    router: Router,
    config: ServiceConfig,
    logger: Logger,
    metrics: MetricsRecorder,
}

impl ServiceServer {
    /// Create a new HTTP server with the given configuration and telemetry handles.
    pub fn new(config: ServiceConfig, logger: Logger, metrics: MetricsRecorder) -> Self {
        let state = AppState {
            identity: Arc::new(config.service.clone()),
            metrics: metrics.clone(),
        };
        let interceptor = Interceptor::new(logger.clone(), metrics.clone());
        let router = Self::build_router(&config, state, interceptor);

        Self {
            router,
            config,
            logger,
            metrics,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServiceConfig, state: AppState, interceptor: Interceptor) -> Router {
        let routes = Router::new()
            .route("/", get(handlers::root))
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .with_state(state);

        instrument(
            routes,
            interceptor,
            Duration::from_secs(config.timeouts.request_secs),
        )
    }

    /// The fully instrumented router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        self.logger.info(
            format!("{} service starting", self.config.service.display_name),
            Fields::new()
                .with("address", addr.to_string())
                .with("port", addr.port()),
        );

        let upkeep = self.metrics.is_enabled().then(|| {
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
                loop {
                    interval.tick().await;
                    metrics.run_upkeep();
                }
            })
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await;

        if let Some(upkeep) = upkeep {
            upkeep.abort();
        }

        self.logger.info("HTTP server stopped", Fields::new());
        result
    }
}
