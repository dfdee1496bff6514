//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the process logger from configuration
//! - Start the trace pipeline and the metrics recorder
//! - Degrade to "no channel" when a telemetry collaborator fails
//!
//! # Design Decisions
//! - Each failing channel is reported once at ERROR through the logger
//! - The logger itself cannot fail to start

use crate::config::ServiceConfig;
use crate::observability::{init_telemetry, Fields, Level, Logger, MetricsRecorder, TelemetryGuard};

/// Telemetry handles owned by the running process.
#[derive(Debug)]
pub struct Telemetry {
    pub logger: Logger,
    pub metrics: MetricsRecorder,
    pub guard: TelemetryGuard,
}

/// Bring up logging, tracing and metrics for `config`.
pub fn start_telemetry(config: &ServiceConfig) -> Telemetry {
    let min_level = config
        .observability
        .log_level
        .parse()
        .unwrap_or(Level::Info);
    let logger = Logger::stdout(&config.service.name, min_level);

    let guard = match init_telemetry(config, logger.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            logger.error(
                "Failed to initialize tracing",
                Fields::new().with("error", e.to_string()),
            );
            TelemetryGuard::default()
        }
    };

    let metrics = build_metrics(config, &logger);

    Telemetry {
        logger,
        metrics,
        guard,
    }
}

/// Metrics recorder for `config`, or a disabled one when metrics are off or
/// the recorder cannot be built.
pub fn build_metrics(config: &ServiceConfig, logger: &Logger) -> MetricsRecorder {
    if !config.observability.metrics_enabled {
        return MetricsRecorder::disabled();
    }

    match MetricsRecorder::new(&config.observability.duration_buckets) {
        Ok(metrics) => metrics,
        Err(e) => {
            logger.error(
                "Failed to initialize metrics",
                Fields::new().with("error", e.to_string()),
            );
            MetricsRecorder::disabled()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::MemorySink;
    use std::sync::Arc;

    fn capture() -> (Logger, MemorySink) {
        let sink = MemorySink::new();
        let logger = Logger::with_sink("startup-test", Level::Debug, Arc::new(sink.clone()));
        (logger, sink)
    }

    #[test]
    fn metrics_enabled_by_default() {
        let (logger, sink) = capture();
        let metrics = build_metrics(&ServiceConfig::default(), &logger);
        assert!(metrics.is_enabled());
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn metrics_can_be_turned_off() {
        let (logger, _) = capture();
        let mut config = ServiceConfig::default();
        config.observability.metrics_enabled = false;
        assert!(!build_metrics(&config, &logger).is_enabled());
    }

    #[test]
    fn metrics_failure_is_logged_once_and_disabled() {
        let (logger, sink) = capture();
        let mut config = ServiceConfig::default();
        config.observability.duration_buckets.clear();

        let metrics = build_metrics(&config, &logger);
        assert!(!metrics.is_enabled());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "ERROR");
        assert_eq!(records[0]["message"], "Failed to initialize metrics");
        assert!(records[0]["fields"]["error"].is_string());
    }
}
