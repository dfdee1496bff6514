//! Instrumented HTTP Service
//!
//! A thin HTTP service whose every request is logged, counted and traced
//! the same way.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────┐
//!                              │                   SERVICE                         │
//!     Client Request           │  ┌──────────┐   ┌─────────────┐   ┌──────────┐   │
//!     ─────────────────────────┼─▶│  trace   │──▶│ interceptor │──▶│ handlers │   │
//!                              │  │  span    │   │  (incoming) │   │ / health │   │
//!                              │  └──────────┘   └─────────────┘   │ /metrics │   │
//!                              │                                   └────┬─────┘   │
//!     Client Response          │                 ┌─────────────┐        │         │
//!     ◀────────────────────────┼─────────────────│ interceptor │◀───────┘         │
//!                              │                 │ (completed) │                  │
//!                              │                 └──────┬──────┘                  │
//!                              │           ┌────────────┴───────────┐             │
//!                              │           ▼                        ▼             │
//!                              │   ┌──────────────┐        ┌──────────────┐       │
//!                              │   │ JSON logger  │        │   metrics    │       │
//!                              │   │   (stdout)   │        │  recorder    │       │
//!                              │   └──────────────┘        └──────────────┘       │
//!                              └──────────────────────────────────────────────────┘
//!                                                  │ OTLP
//!                                                  ▼
//!                                          otel-collector
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rust_service::config;
use rust_service::http::ServiceServer;
use rust_service::lifecycle::{signals, start_telemetry, Shutdown};
use rust_service::observability::Fields;

#[derive(Parser)]
#[command(name = "rust-service")]
#[command(about = "HTTP service with structured logs, Prometheus metrics and OpenTelemetry traces", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind.to_string();
    }

    let telemetry = start_telemetry(&config);
    let logger = telemetry.logger.clone();

    logger.debug(
        "Configuration loaded",
        Fields::new()
            .with("bind_address", config.listener.bind_address.clone())
            .with("request_timeout_secs", config.timeouts.request_secs)
            .with("metrics_enabled", telemetry.metrics.is_enabled())
            .with("tracing_enabled", telemetry.guard.is_exporting()),
    );

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            logger.error(
                "Failed to bind listener",
                Fields::new()
                    .with("bind_address", config.listener.bind_address.clone())
                    .with("error", e.to_string()),
            );
            telemetry.guard.shutdown();
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);

    let server = ServiceServer::new(config, logger.clone(), telemetry.metrics.clone());
    let result = server.run(listener, shutdown.subscribe()).await;

    telemetry.guard.shutdown();
    logger.info("Shutdown complete", Fields::new());
    Ok(result?)
}
