//! Logging configuration loaded from environment variables.
//!
//! Every variable has a documented default. A malformed value never aborts
//! the process: it is replaced by the default and remembered as a
//! [`Fallback`] so the pipeline can report it once logging is up.

use std::{env, ffi::OsString, fmt, path::PathBuf, str::FromStr, time::Duration};

use common::Level;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_OTEL_ENDPOINT: &str = "http://localhost:4317";
pub const DEFAULT_SERVICE_NAME: &str = "python-app";
pub const DEFAULT_EXPORT_TIMEOUT_MS: u64 = 30_000;

/// The variables read by [`LoggingConfig::from_env`].
pub const VARIABLES: [&str; 7] = [
    "LOG_LEVEL",
    "LOG_FORMAT",
    "LOG_FILE_PATH",
    "OTEL_LOGS_EXPORT_MODE",
    "OTEL_ENDPOINT",
    "OTEL_SERVICE_NAME",
    "OTEL_EXPORT_TIMEOUT",
];

const FILE_PATH_VARIABLE: &str = "LOG_FILE_PATH";

/// Error returned when an enumerated setting has an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {setting}: {value:?}")]
pub struct UnknownValue {
    pub setting: &'static str,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Enumerated settings
// ---------------------------------------------------------------------------

/// Console formatter selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable, ANSI-coloured.
    Console,
    /// Human-readable, no colour.
    Plain,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Console => "console",
            LogFormat::Plain => "plain",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "console" => Ok(LogFormat::Console),
            "plain" => Ok(LogFormat::Plain),
            _ => Err(UnknownValue {
                setting: "log format",
                value: s.to_owned(),
            }),
        }
    }
}

/// Sink selection from `OTEL_LOGS_EXPORT_MODE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportMode {
    /// Local file only.
    #[default]
    File,
    /// OTLP collector only.
    Otlp,
    /// Local file and OTLP collector.
    Both,
}

impl ExportMode {
    pub fn writes_file(&self) -> bool {
        matches!(self, ExportMode::File | ExportMode::Both)
    }

    pub fn writes_otlp(&self) -> bool {
        matches!(self, ExportMode::Otlp | ExportMode::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMode::File => "file",
            ExportMode::Otlp => "otlp",
            ExportMode::Both => "both",
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportMode {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(ExportMode::File),
            "otlp" => Ok(ExportMode::Otlp),
            "both" => Ok(ExportMode::Both),
            _ => Err(UnknownValue {
                setting: "export mode",
                value: s.to_owned(),
            }),
        }
    }
}

/// A rejected environment value that was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    /// Environment variable name, e.g. `"LOG_LEVEL"`.
    pub variable: &'static str,
    /// The raw value that was rejected.
    pub value: String,
}

// ---------------------------------------------------------------------------
// LoggingConfig
// ---------------------------------------------------------------------------

/// Snapshot of the logging environment, taken once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level emitted (`LOG_LEVEL`).
    pub level: Level,
    /// Console formatter (`LOG_FORMAT`).
    pub format: LogFormat,
    /// Local log file (`LOG_FILE_PATH`).
    pub file_path: Option<PathBuf>,
    /// Sink selection (`OTEL_LOGS_EXPORT_MODE`).
    pub export_mode: ExportMode,
    /// OTLP collector endpoint (`OTEL_ENDPOINT`).
    pub otel_endpoint: String,
    /// `service.name` resource attribute (`OTEL_SERVICE_NAME`).
    pub service_name: String,
    /// Per-export timeout in milliseconds (`OTEL_EXPORT_TIMEOUT`).
    pub export_timeout_ms: u64,
    /// Deployment environment label, set by `setup_application_logging`.
    pub environment: Option<String>,
    /// Values rejected while loading.
    pub fallbacks: Vec<Fallback>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: LogFormat::Json,
            file_path: None,
            export_mode: ExportMode::File,
            otel_endpoint: DEFAULT_OTEL_ENDPOINT.into(),
            service_name: DEFAULT_SERVICE_NAME.into(),
            export_timeout_ms: DEFAULT_EXPORT_TIMEOUT_MS,
            environment: None,
            fallbacks: Vec::new(),
        }
    }
}

/// Raw, unvalidated view of the environment.
///
/// Every field is a string so that deserialisation cannot fail on a bad
/// value; validation happens field by field in [`LoggingConfig::from_raw`].
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    log_level: Option<String>,
    log_format: Option<String>,
    log_file_path: Option<String>,
    otel_logs_export_mode: Option<String>,
    otel_endpoint: Option<String>,
    otel_service_name: Option<String>,
    otel_export_timeout: Option<String>,
}

impl LoggingConfig {
    /// Load the configuration from the process environment.
    ///
    /// Only the [`VARIABLES`] are read. A value that is not valid Unicode is
    /// a fallback like any other malformed value, except `LOG_FILE_PATH`,
    /// which is taken as a raw OS path.
    pub fn from_env() -> Self {
        let mut vars = config::Map::new();
        let mut unreadable = Vec::new();
        let mut raw_file_path = None;

        for variable in VARIABLES {
            match env::var_os(variable).map(OsString::into_string) {
                Some(Ok(value)) => {
                    vars.insert(variable.to_owned(), value);
                }
                Some(Err(raw)) if variable == FILE_PATH_VARIABLE => raw_file_path = Some(raw),
                Some(Err(raw)) => {
                    unreadable.push(reject(variable, raw.to_string_lossy().into_owned()));
                }
                None => {}
            }
        }

        let mut cfg = Self::from_vars(vars);
        if let Some(raw) = raw_file_path {
            cfg.file_path = Some(PathBuf::from(raw));
        }
        unreadable.append(&mut cfg.fallbacks);
        cfg.fallbacks = unreadable;
        cfg
    }

    /// Load the configuration from an explicit variable map instead of the
    /// process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(config::Environment::default().source(Some(map)))
    }

    /// Attach a deployment environment label.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Export timeout as a [`Duration`].
    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }

    fn load(source: config::Environment) -> Self {
        let raw = config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|cfg| cfg.try_deserialize::<RawSettings>());

        match raw {
            Ok(raw) => Self::from_raw(raw),
            Err(e) => {
                let mut cfg = Self::default();
                cfg.fallbacks.push(Fallback {
                    variable: "environment",
                    value: e.to_string(),
                });
                cfg
            }
        }
    }

    fn from_raw(raw: RawSettings) -> Self {
        let mut cfg = Self::default();
        let mut fallbacks = Vec::new();

        if let Some(v) = present(raw.log_level) {
            match v.parse() {
                Ok(level) => cfg.level = level,
                Err(_) => fallbacks.push(reject("LOG_LEVEL", v)),
            }
        }
        if let Some(v) = present(raw.log_format) {
            match v.parse() {
                Ok(format) => cfg.format = format,
                Err(_) => fallbacks.push(reject("LOG_FORMAT", v)),
            }
        }
        if let Some(v) = present(raw.log_file_path) {
            cfg.file_path = Some(PathBuf::from(v));
        }
        if let Some(v) = present(raw.otel_logs_export_mode) {
            match v.parse() {
                Ok(mode) => cfg.export_mode = mode,
                Err(_) => fallbacks.push(reject("OTEL_LOGS_EXPORT_MODE", v)),
            }
        }
        if let Some(v) = present(raw.otel_endpoint) {
            cfg.otel_endpoint = v.trim().to_owned();
        }
        if let Some(v) = present(raw.otel_service_name) {
            cfg.service_name = v;
        }
        if let Some(v) = present(raw.otel_export_timeout) {
            match v.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => cfg.export_timeout_ms = ms,
                _ => fallbacks.push(reject("OTEL_EXPORT_TIMEOUT", v)),
            }
        }

        cfg.fallbacks = fallbacks;
        cfg
    }
}

/// Treat empty and whitespace-only values as unset.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn reject(variable: &'static str, value: String) -> Fallback {
    Fallback { variable, value }
}
