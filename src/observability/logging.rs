//! Structured logging.
//!
//! # Responsibilities
//! - Render a log event as one JSON object per line
//! - Keep request/context fields nested under a single `fields` key
//! - Write each line to the sink in one call, without any extra formatting
//!
//! # Output
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.123Z","level":"INFO","service":"rust-service","message":"Incoming HTTP request","fields":{"method":"GET"}}
//! ```
//!
//! # Design Decisions
//! - `fields` is omitted when empty, never emitted as `{}`
//! - Values that have no JSON form are stringified instead of failing the call
//! - Sink failures are swallowed; the logger never logs about itself

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// Level for a completed request with the given HTTP status.
    pub fn for_status(status: u16) -> Self {
        match status {
            500.. => Level::Error,
            400..=499 => Level::Warn,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

/// Error returned when a level name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level `{0}`")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Contextual fields attached to a log event, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert a float. NaN and infinities have no JSON number form and are
    /// stored as strings.
    pub fn insert_f64(&mut self, key: impl Into<String>, value: f64) {
        let value = match Number::from_f64(value) {
            Some(n) => Value::Number(n),
            None => Value::String(value.to_string()),
        };
        self.0.insert(key.into(), value);
    }

    /// Insert any serializable value, falling back to its `Debug` text when
    /// serialization fails.
    pub fn insert_serialize<T>(&mut self, key: impl Into<String>, value: &T)
    where
        T: Serialize + fmt::Debug + ?Sized,
    {
        let value = serde_json::to_value(value).unwrap_or_else(|_| Value::String(format!("{value:?}")));
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Fields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A single structured log record.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub service: String,
    pub message: String,
    #[serde(skip_serializing_if = "Fields::is_empty")]
    pub fields: Fields,
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl LogEvent {
    pub fn new(level: Level, service: impl Into<String>, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            service: service.into(),
            message: message.into(),
            fields,
        }
    }

    /// Render as a single JSON line, without the trailing newline.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Destination for rendered log lines.
pub trait LogSink: Send + Sync {
    /// Write one complete line. `line` already ends with `\n`.
    fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Writes to the process standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(line.as_bytes())?;
        out.flush()
    }
}

/// Keeps lines in memory. Used to inspect log output in tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Captured lines parsed back into JSON objects.
    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))?;
        lines.push(line.trim_end_matches('\n').to_string());
        Ok(())
    }
}

/// Handle used by every part of the service to emit structured logs.
#[derive(Clone)]
pub struct Logger {
    service: Arc<str>,
    min_level: Level,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    /// Logger writing to stdout.
    pub fn stdout(service: impl AsRef<str>, min_level: Level) -> Self {
        Self::with_sink(service, min_level, Arc::new(StdoutSink))
    }

    pub fn with_sink(service: impl AsRef<str>, min_level: Level, sink: Arc<dyn LogSink>) -> Self {
        Self {
            service: Arc::from(service.as_ref()),
            min_level,
            sink,
        }
    }

    /// Same service and sink, with no minimum level.
    pub fn unfiltered(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            min_level: Level::Debug,
            sink: Arc::clone(&self.sink),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Emit one log line. Never fails.
    pub fn emit(&self, level: Level, message: impl Into<String>, fields: Fields) {
        if !self.enabled(level) {
            return;
        }
        let event = LogEvent::new(level, &*self.service, message, fields);
        self.write(&event);
    }

    pub fn debug(&self, message: impl Into<String>, fields: Fields) {
        self.emit(Level::Debug, message, fields);
    }

    pub fn info(&self, message: impl Into<String>, fields: Fields) {
        self.emit(Level::Info, message, fields);
    }

    pub fn warn(&self, message: impl Into<String>, fields: Fields) {
        self.emit(Level::Warn, message, fields);
    }

    pub fn error(&self, message: impl Into<String>, fields: Fields) {
        self.emit(Level::Error, message, fields);
    }

    fn write(&self, event: &LogEvent) {
        let Ok(mut line) = event.to_json() else {
            return;
        };
        line.push('\n');
        let _ = self.sink.write_line(&line);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("service", &self.service)
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn capture(min_level: Level) -> (Logger, MemorySink) {
        let sink = MemorySink::new();
        let logger = Logger::with_sink("test-service", min_level, Arc::new(sink.clone()));
        (logger, sink)
    }

    #[test]
    fn nests_fields_under_fields_key() {
        let (logger, sink) = capture(Level::Debug);
        logger.info("hello", Fields::new().with("a", 1));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["fields"]["a"], 1);
        assert!(record.get("a").is_none(), "fields must not be merged into the top level");
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["service"], "test-service");
        assert_eq!(record["message"], "hello");
    }

    #[test]
    fn omits_fields_when_empty() {
        let (logger, sink) = capture(Level::Debug);
        logger.warn("no context", Fields::new());

        let record = &sink.records()[0];
        let keys: Vec<&str> = record.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["timestamp", "level", "service", "message"]);
    }

    #[test]
    fn writes_exactly_one_line_per_call() {
        let (logger, sink) = capture(Level::Debug);
        logger.error("multi\nline message", Fields::new().with("text", "a\nb"));
        logger.debug("second", Fields::new());

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.contains('\n')));
    }

    #[test]
    fn timestamp_is_utc_rfc3339() {
        let (logger, sink) = capture(Level::Debug);
        logger.info("tick", Fields::new());

        let ts = sink.records()[0]["timestamp"].as_str().unwrap().to_string();
        assert!(ts.ends_with('Z'), "timestamp should be UTC: {ts}");
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn filters_below_min_level() {
        let (logger, sink) = capture(Level::Warn);
        logger.info("dropped", Fields::new());
        logger.debug("dropped", Fields::new());
        logger.warn("kept", Fields::new());
        logger.error("kept", Fields::new());

        let levels: Vec<String> = sink
            .records()
            .iter()
            .map(|r| r["level"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(levels, ["WARN", "ERROR"]);
    }

    #[test]
    fn unfiltered_shares_sink_and_ignores_min_level() {
        let (logger, sink) = capture(Level::Error);
        let all = logger.unfiltered();
        logger.info("dropped", Fields::new());
        all.debug("kept", Fields::new());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "kept");
        assert_eq!(records[0]["service"], "test-service");
    }

    #[test]
    fn status_to_level_mapping() {
        assert_eq!(Level::for_status(200), Level::Info);
        assert_eq!(Level::for_status(302), Level::Info);
        assert_eq!(Level::for_status(399), Level::Info);
        assert_eq!(Level::for_status(400), Level::Warn);
        assert_eq!(Level::for_status(404), Level::Warn);
        assert_eq!(Level::for_status(499), Level::Warn);
        assert_eq!(Level::for_status(500), Level::Error);
        assert_eq!(Level::for_status(503), Level::Error);
        assert_eq!(Level::for_status(599), Level::Error);
    }

    #[test]
    fn parses_level_names() {
        assert_eq!("INFO".parse::<Level>(), Ok(Level::Info));
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert_eq!("trace".parse::<Level>(), Ok(Level::Debug));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn non_finite_floats_are_stringified() {
        let mut fields = Fields::new();
        fields.insert_f64("ratio", f64::NAN);
        fields.insert_f64("duration", 0.25);

        assert_eq!(fields.get("ratio"), Some(&Value::String("NaN".into())));
        assert_eq!(fields.get("duration"), Some(&serde_json::json!(0.25)));
    }

    #[test]
    fn unserializable_values_fall_back_to_debug() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");

        let mut fields = Fields::new();
        fields.insert_serialize("weird", &map);
        fields.insert_serialize("nested", &serde_json::json!({"inner": {"ok": true}}));

        assert!(fields.get("weird").unwrap().is_string());
        assert_eq!(fields.get("nested").unwrap()["inner"]["ok"], true);
    }

    #[test]
    fn preserves_field_insertion_order() {
        let (logger, sink) = capture(Level::Debug);
        logger.info(
            "ordered",
            Fields::new().with("zeta", 1).with("alpha", 2).with("mid", 3),
        );

        let line = &sink.lines()[0];
        let zeta = line.find("zeta").unwrap();
        let alpha = line.find("alpha").unwrap();
        let mid = line.find("mid").unwrap();
        assert!(zeta < alpha && alpha < mid);
    }
}
