//! Environment-driven structured logging.
//!
//! `LOG_*` and `OTEL_*` variables choose the console formatter, the minimum
//! level and the sinks a record reaches: a local JSON-lines file, an
//! OpenTelemetry collector over OTLP/gRPC, or both.
//!
//! ```ignore
//! let logging = logkit::setup_application_logging("billing", "production")?;
//! let log = logging.get_logger("billing.api").bind([("request_id", "req_123")]);
//! log.info("Processing request", &[]);
//! logging.shutdown()?;
//! ```
//!
//! `tracing` events are bridged into the same pipeline once
//! [`configure_logging`] has run.

pub mod bridge;
pub mod exporter;
pub mod format;
pub mod init;
pub mod logger;
pub mod pipeline;
pub mod settings;

pub use common::{Fields, Level, LogRecord, LoggingError};
pub use exporter::{ExportError, LogExporter};
pub use init::{configure_logging, get_logger, setup_application_logging, Logging};
pub use logger::{log_performance, Logger};
pub use pipeline::LogPipeline;
pub use settings::{ExportMode, LogFormat, LoggingConfig, UnknownValue};
