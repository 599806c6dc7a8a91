//! Structured log records exchanged between logger handles, formatters and
//! exporters.
//!
//! A record serialises to a single flat JSON object:
//! `{"event", "level", "logger", "timestamp", ...fields}`. The four reserved
//! keys always win over a colliding context field.

use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

/// Key-value context attached to a record.
pub type Fields = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Level
// ---------------------------------------------------------------------------

/// Record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// Lowercase name used in JSON output, e.g. `"warning"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }

    /// Uppercase name as accepted in `LOG_LEVEL`, e.g. `"WARNING"`.
    pub fn as_upper(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name is not one of the five known levels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            _ => Err(UnknownLevel(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One structured log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Creation time (UTC).
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: Level,
    /// Name of the emitting logger handle or `tracing` target.
    pub logger: String,
    /// The log message.
    pub event: String,
    /// Bound context merged with call-site fields.
    pub fields: Fields,
}

impl LogRecord {
    /// Construct a record stamped with the current time.
    pub fn new(
        level: Level,
        logger: impl Into<String>,
        event: impl Into<String>,
        fields: Fields,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            event: event.into(),
            fields,
        }
    }

    /// RFC 3339 timestamp with microsecond precision, e.g.
    /// `2024-01-01T12:00:00.000000Z`.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Flat JSON object form of this record.
    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("event".into(), Value::String(self.event.clone()));
        map.insert("level".into(), Value::String(self.level.as_str().into()));
        map.insert("logger".into(), Value::String(self.logger.clone()));
        map.insert("timestamp".into(), Value::String(self.timestamp_rfc3339()));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_parsing_is_case_insensitive() {
        assert_eq!("debug".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!(" WARNING ".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("Critical".parse::<Level>().unwrap(), Level::Critical);
        assert!("verbose".parse::<Level>().is_err());
        assert!("WARN".parse::<Level>().is_err());
    }

    #[test]
    fn unknown_level_names_the_value() {
        let err = "verbose".parse::<Level>().unwrap_err();
        assert_eq!(err, UnknownLevel("verbose".into()));
        assert_eq!(err.to_string(), "unknown log level: verbose");
    }

    #[test]
    fn level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warning);
        assert!(Level::Error < Level::Critical);
        assert_eq!(Level::default(), Level::Info);
    }

    #[test]
    fn record_json_is_flat() {
        let mut fields = Fields::new();
        fields.insert("user_id".into(), json!("test_user"));
        fields.insert("attempt".into(), json!(3));
        let record = LogRecord::new(Level::Info, "e2e_test", "Test message", fields);

        let value = record.to_json();
        assert_eq!(value["event"], "Test message");
        assert_eq!(value["level"], "info");
        assert_eq!(value["logger"], "e2e_test");
        assert_eq!(value["user_id"], "test_user");
        assert_eq!(value["attempt"], 3);
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn reserved_keys_win_over_fields() {
        let mut fields = Fields::new();
        fields.insert("level".into(), json!("bogus"));
        fields.insert("event".into(), json!("shadowed"));
        let record = LogRecord::new(Level::Error, "x", "real", fields);

        let value = record.to_json();
        assert_eq!(value["level"], "error");
        assert_eq!(value["event"], "real");
    }
}
