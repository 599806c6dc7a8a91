//! Log exporters: the sinks a record is fanned out to after console output.
//!
//! Which exporters exist is decided once, from [`LoggingConfig::export_mode`]:
//!
//! | mode   | file exporter (needs `LOG_FILE_PATH`) | OTLP exporter |
//! |--------|---------------------------------------|---------------|
//! | `file` | yes                                   | no            |
//! | `otlp` | no                                    | yes           |
//! | `both` | yes                                   | yes           |

pub mod file;
pub mod otlp;

pub use file::FileLogExporter;
pub use otlp::OtlpLogExporter;

use std::path::PathBuf;

use common::LogRecord;
use thiserror::Error;

use crate::settings::LoggingConfig;

/// Errors produced by exporters.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The log file could not be created, opened or written.
    #[error("failed to write log file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OTLP exporter was created outside a Tokio runtime.
    #[error("OTLP export requires a running Tokio runtime")]
    NoRuntime,

    /// The OTLP exporter could not be built.
    #[error("failed to build OTLP exporter for {endpoint}: {message}")]
    Build { endpoint: String, message: String },

    /// Buffered records could not be flushed.
    #[error("flush failed: {0}")]
    Flush(String),

    /// The exporter did not shut down cleanly.
    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

/// A destination for log records.
///
/// Implementations must never panic on I/O failure; errors are returned to
/// the pipeline, which reports them without interrupting other exporters.
#[cfg_attr(test, mockall::automock)]
pub trait LogExporter: Send + Sync {
    /// Short stable name used in diagnostics, e.g. `"file"`.
    fn name(&self) -> &'static str;

    /// Export one record.
    fn export(&self, record: &LogRecord) -> Result<(), ExportError>;

    /// Push any buffered records to the destination.
    fn flush(&self) -> Result<(), ExportError> {
        Ok(())
    }

    /// Flush and release resources. Called once.
    fn shutdown(&self) -> Result<(), ExportError>;
}

/// Exporters built from a configuration, plus the failures met on the way.
///
/// Creation failures are not fatal: the affected sink is skipped and the
/// pipeline reports each failure once logging is available.
#[derive(Default)]
pub struct ExporterSet {
    pub exporters: Vec<Box<dyn LogExporter>>,
    pub failures: Vec<ExportError>,
}

impl ExporterSet {
    /// Names of the exporters that were created, in fan-out order.
    pub fn names(&self) -> Vec<&'static str> {
        self.exporters.iter().map(|e| e.name()).collect()
    }
}

/// Create the exporters selected by `cfg.export_mode`.
pub fn build_exporters(cfg: &LoggingConfig) -> ExporterSet {
    let mut set = ExporterSet::default();

    if cfg.export_mode.writes_file() {
        if let Some(path) = &cfg.file_path {
            set.exporters.push(Box::new(FileLogExporter::new(path)));
        }
    }

    if cfg.export_mode.writes_otlp() {
        match OtlpLogExporter::from_config(cfg) {
            Ok(exporter) => set.exporters.push(Box::new(exporter)),
            Err(e) => set.failures.push(e),
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ExportMode;

    fn cfg(mode: ExportMode, file: Option<&std::path::Path>) -> LoggingConfig {
        LoggingConfig {
            export_mode: mode,
            file_path: file.map(PathBuf::from),
            export_timeout_ms: 1000,
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn file_mode_creates_file_exporter() {
        let dir = tempfile::tempdir().unwrap();
        let set = build_exporters(&cfg(ExportMode::File, Some(&dir.path().join("a.log"))));
        assert_eq!(set.names(), ["file"]);
        assert!(set.failures.is_empty());
    }

    #[test]
    fn file_mode_without_path_creates_nothing() {
        let set = build_exporters(&cfg(ExportMode::File, None));
        assert!(set.exporters.is_empty());
        assert!(set.failures.is_empty());
    }

    #[test]
    fn otlp_mode_outside_runtime_is_reported_not_raised() {
        let set = build_exporters(&cfg(ExportMode::Otlp, None));
        assert!(set.exporters.is_empty());
        assert!(matches!(set.failures.as_slice(), [ExportError::NoRuntime]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn otlp_mode_creates_only_otlp_exporter() {
        let dir = tempfile::tempdir().unwrap();
        // A file path alone must not add a file sink in otlp mode.
        let set = build_exporters(&cfg(ExportMode::Otlp, Some(&dir.path().join("a.log"))));
        assert_eq!(set.names(), ["otlp"]);
        for exporter in &set.exporters {
            exporter.shutdown().ok();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn both_mode_creates_both_exporters() {
        let dir = tempfile::tempdir().unwrap();
        let set = build_exporters(&cfg(ExportMode::Both, Some(&dir.path().join("a.log"))));
        assert_eq!(set.names(), ["file", "otlp"]);
        for exporter in &set.exporters {
            exporter.shutdown().ok();
        }
    }
}
