//! `tracing` integration.
//!
//! Routes every `tracing` event through the service [`Logger`] so library
//! and lifecycle events share the request log format. The event `message`
//! becomes the log message and every other event field is nested under
//! `fields`. Span data is left to the OpenTelemetry layer.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::logging::{Fields, Level, Logger};

/// A [`Layer`] rendering events as single-line JSON records.
#[derive(Debug, Clone)]
pub struct JsonLogLayer {
    logger: Logger,
}

impl JsonLogLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for JsonLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = Level::from(event.metadata().level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| event.metadata().name().to_string());
        self.logger.emit(level, message, visitor.fields);
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Fields,
}

impl EventVisitor {
    fn is_message(field: &Field) -> bool {
        field.name() == "message"
    }

    // Fields added by the `log` compatibility shim.
    fn is_log_metadata(field: &Field) -> bool {
        field.name().starts_with("log.")
    }
}

impl Visit for EventVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        if !Self::is_log_metadata(field) {
            self.fields.insert_f64(field.name(), value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if !Self::is_log_metadata(field) {
            self.fields.insert(field.name(), value);
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if !Self::is_log_metadata(field) {
            self.fields.insert(field.name(), value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if !Self::is_log_metadata(field) {
            self.fields.insert(field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if Self::is_message(field) {
            self.message = Some(value.to_string());
        } else if !Self::is_log_metadata(field) {
            self.fields.insert(field.name(), value);
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if !Self::is_log_metadata(field) {
            self.fields.insert(field.name(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if Self::is_message(field) {
            self.message = Some(format!("{value:?}"));
        } else if !Self::is_log_metadata(field) {
            self.fields.insert(field.name(), format!("{value:?}"));
        }
    }
}
