//! [`LogPipeline`]: the explicitly built object every record flows through.
//!
//! # Record path
//!
//! 1. Records below the configured level are dropped.
//! 2. The record is rendered to the console with the selected formatter.
//! 3. The record is fanned out to each exporter in turn. An exporter error is
//!    reported as a console-only diagnostic and never reaches the caller or
//!    the remaining exporters.
//!
//! Diagnostics about the pipeline itself (rejected settings, exporter
//! failures) never go to the exporters, so a failing sink cannot feed itself.

use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use common::{Fields, Level, LogRecord, LoggingError};
use serde_json::Value;

use crate::{
    exporter::{build_exporters, ExporterSet, LogExporter},
    format,
    logger::Logger,
    settings::LoggingConfig,
};

/// Logger name used for the pipeline's own diagnostics.
pub const DIAGNOSTIC_LOGGER: &str = "logkit";

type ConsoleWriter = Box<dyn Write + Send>;

/// Builder for [`LogPipeline`].
///
/// Defaults: console on stdout, exporters chosen by the configuration.
pub struct LogPipelineBuilder {
    config: LoggingConfig,
    console: Option<ConsoleWriter>,
    exporters: Option<Vec<Box<dyn LogExporter>>>,
}

impl LogPipelineBuilder {
    /// Send console output to `writer` instead of stdout.
    pub fn with_console(mut self, writer: impl Write + Send + 'static) -> Self {
        self.console = Some(Box::new(writer));
        self
    }

    /// Use exactly these exporters instead of building them from the
    /// configuration's export mode.
    pub fn with_exporters(mut self, exporters: Vec<Box<dyn LogExporter>>) -> Self {
        self.exporters = Some(exporters);
        self
    }

    /// Build the pipeline and report any rejected settings or exporter
    /// creation failures through it.
    pub fn build(self) -> LogPipeline {
        let ExporterSet {
            exporters,
            failures,
        } = match self.exporters {
            Some(exporters) => ExporterSet {
                exporters,
                failures: Vec::new(),
            },
            None => build_exporters(&self.config),
        };

        let console: ConsoleWriter = match self.console {
            Some(writer) => writer,
            None => Box::new(std::io::stdout()),
        };
        let pipeline = LogPipeline {
            console: Mutex::new(console),
            exporters,
            shut_down: AtomicBool::new(false),
            config: self.config,
        };

        for fallback in &pipeline.config.fallbacks {
            pipeline.diagnose(
                Level::Warning,
                "Invalid logging setting, using default",
                [
                    ("variable", Value::from(fallback.variable)),
                    ("value", Value::from(fallback.value.clone())),
                ],
            );
        }
        for failure in failures {
            pipeline.diagnose(
                Level::Error,
                "Failed to create log exporter",
                [("error", Value::from(failure.to_string()))],
            );
        }

        pipeline
    }
}

/// Level filter, console formatter and exporter fan-out for one process.
pub struct LogPipeline {
    config: LoggingConfig,
    console: Mutex<ConsoleWriter>,
    exporters: Vec<Box<dyn LogExporter>>,
    shut_down: AtomicBool,
}

impl LogPipeline {
    pub fn builder(config: LoggingConfig) -> LogPipelineBuilder {
        LogPipelineBuilder {
            config,
            console: None,
            exporters: None,
        }
    }

    /// Build a pipeline with stdout console output and the exporters
    /// selected by `config`.
    pub fn new(config: LoggingConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Names of the active exporters, in fan-out order.
    pub fn exporter_names(&self) -> Vec<&'static str> {
        self.exporters.iter().map(|e| e.name()).collect()
    }

    /// Returns `true` if records at `level` pass the level filter.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.config.level
    }

    /// Return a logger handle named `name` that emits through this pipeline.
    pub fn logger(self: &Arc<Self>, name: &str) -> Logger {
        Logger::new(Arc::clone(self), name)
    }

    /// Send a record to the console and every exporter.
    pub fn dispatch(&self, record: &LogRecord) {
        if !self.enabled(record.level) {
            return;
        }
        self.write_console(record);

        if self.shut_down.load(Ordering::Acquire) {
            return;
        }
        for exporter in &self.exporters {
            if let Err(e) = exporter.export(record) {
                self.diagnose(
                    Level::Error,
                    "Failed to export log",
                    [
                        ("exporter", Value::from(exporter.name())),
                        ("error", Value::from(e.to_string())),
                    ],
                );
            }
        }
    }

    /// Send a record to the console only.
    pub fn dispatch_console(&self, record: &LogRecord) {
        if self.enabled(record.level) {
            self.write_console(record);
        }
    }

    /// Flush the console and every exporter. Failures are reported, not
    /// returned.
    pub fn flush(&self) {
        if let Ok(mut console) = self.console.lock() {
            let _ = console.flush();
        }
        for exporter in &self.exporters {
            if let Err(e) = exporter.flush() {
                self.diagnose(
                    Level::Warning,
                    "Failed to flush log exporter",
                    [
                        ("exporter", Value::from(exporter.name())),
                        ("error", Value::from(e.to_string())),
                    ],
                );
            }
        }
    }

    /// Shut every exporter down. Only the first call does any work.
    ///
    /// # Errors
    ///
    /// Every exporter is shut down even if an earlier one fails; each failure
    /// is reported and the first is returned as [`LoggingError::Export`].
    pub fn shutdown(&self) -> Result<(), LoggingError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first = None;
        for exporter in &self.exporters {
            if let Err(e) = exporter.shutdown() {
                self.diagnose(
                    Level::Error,
                    "Error shutting down exporter",
                    [
                        ("exporter", Value::from(exporter.name())),
                        ("error", Value::from(e.to_string())),
                    ],
                );
                first.get_or_insert(LoggingError::Export {
                    exporter: exporter.name(),
                    message: e.to_string(),
                });
            }
        }
        if let Ok(mut console) = self.console.lock() {
            let _ = console.flush();
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_console(&self, record: &LogRecord) {
        let line = format::render(self.config.format, record);
        // A poisoned console still accepts writes.
        let mut console = self.console.lock().unwrap_or_else(|e| e.into_inner());
        let _ = console.write_all(line.as_bytes());
    }

    fn diagnose<const N: usize>(&self, level: Level, event: &str, fields: [(&str, Value); N]) {
        let fields: Fields = fields
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();
        self.dispatch_console(&LogRecord::new(level, DIAGNOSTIC_LOGGER, event, fields));
    }
}

impl std::fmt::Debug for LogPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogPipeline")
            .field("config", &self.config)
            .field("exporters", &self.exporter_names())
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exporter::{ExportError, MockLogExporter},
        settings::{ExportMode, Fallback, LogFormat},
        test_support::{RecordingExporter, SharedBuffer},
    };
    use mockall::Sequence;
    use serde_json::json;

    fn config(level: Level) -> LoggingConfig {
        LoggingConfig {
            level,
            ..LoggingConfig::default()
        }
    }

    fn record(level: Level, event: &str) -> LogRecord {
        LogRecord::new(level, "test", event, Fields::new())
    }

    #[test]
    fn drops_records_below_level() {
        let console = SharedBuffer::default();
        let recorder = RecordingExporter::default();
        let pipeline = LogPipeline::builder(config(Level::Warning))
            .with_console(console.clone())
            .with_exporters(vec![Box::new(recorder.clone())])
            .build();

        pipeline.dispatch(&record(Level::Info, "quiet"));
        pipeline.dispatch(&record(Level::Error, "loud"));

        assert_eq!(recorder.events(), ["loud"]);
        assert_eq!(console.json_lines().len(), 1);
    }

    #[test]
    fn fans_out_to_every_exporter_in_order() {
        let mut seq = Sequence::new();
        let mut first = MockLogExporter::new();
        let mut second = MockLogExporter::new();
        first
            .expect_export()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        second
            .expect_export()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let pipeline = LogPipeline::builder(config(Level::Info))
            .with_console(SharedBuffer::default())
            .with_exporters(vec![Box::new(first), Box::new(second)])
            .build();
        pipeline.dispatch(&record(Level::Info, "hello"));
    }

    #[test]
    fn exporter_error_does_not_stop_other_exporters() {
        let console = SharedBuffer::default();
        let mut failing = MockLogExporter::new();
        failing.expect_name().return_const("file");
        failing.expect_export().returning(|_| {
            Err(ExportError::Flush("disk full".into()))
        });
        let recorder = RecordingExporter::default();

        let pipeline = LogPipeline::builder(config(Level::Info))
            .with_console(console.clone())
            .with_exporters(vec![Box::new(failing), Box::new(recorder.clone())])
            .build();
        pipeline.dispatch(&record(Level::Info, "still delivered"));

        assert_eq!(recorder.events(), ["still delivered"]);

        let lines = console.json_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["event"], "Failed to export log");
        assert_eq!(lines[1]["logger"], DIAGNOSTIC_LOGGER);
        assert_eq!(lines[1]["exporter"], "file");
        assert!(lines[1]["error"].as_str().unwrap().contains("disk full"));
    }

    #[test]
    fn no_exporters_still_writes_console() {
        let console = SharedBuffer::default();
        let pipeline = LogPipeline::builder(config(Level::Info))
            .with_console(console.clone())
            .with_exporters(Vec::new())
            .build();
        pipeline.dispatch(&record(Level::Info, "only console"));
        assert_eq!(console.json_lines()[0]["event"], "only console");
        assert!(pipeline.exporter_names().is_empty());
    }

    #[test]
    fn console_uses_selected_format() {
        let console = SharedBuffer::default();
        let cfg = LoggingConfig {
            format: LogFormat::Plain,
            ..LoggingConfig::default()
        };
        let pipeline = LogPipeline::builder(cfg)
            .with_console(console.clone())
            .with_exporters(Vec::new())
            .build();
        pipeline.dispatch(&record(Level::Info, "plain text"));

        let text = console.contents();
        assert!(text.contains("[info     ] plain text"));
        assert!(serde_json::from_str::<Value>(text.trim_end()).is_err());
    }

    #[test]
    fn fallbacks_are_reported_on_build() {
        let console = SharedBuffer::default();
        let cfg = LoggingConfig {
            fallbacks: vec![Fallback {
                variable: "LOG_FORMAT",
                value: "xml".into(),
            }],
            ..LoggingConfig::default()
        };
        let _pipeline = LogPipeline::builder(cfg)
            .with_console(console.clone())
            .with_exporters(Vec::new())
            .build();

        let lines = console.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "warning");
        assert_eq!(lines[0]["variable"], "LOG_FORMAT");
        assert_eq!(lines[0]["value"], "xml");
    }

    #[test]
    fn exporter_creation_failure_is_reported_on_build() {
        // No Tokio runtime here, so the OTLP exporter cannot be created.
        let console = SharedBuffer::default();
        let cfg = LoggingConfig {
            export_mode: ExportMode::Otlp,
            ..LoggingConfig::default()
        };
        let pipeline = LogPipeline::builder(cfg)
            .with_console(console.clone())
            .build();

        assert!(pipeline.exporter_names().is_empty());
        let lines = console.json_lines();
        assert_eq!(lines[0]["event"], "Failed to create log exporter");
        assert_eq!(lines[0]["level"], "error");
    }

    #[test]
    fn shutdown_runs_once_and_reports_first_failure() {
        let mut failing = MockLogExporter::new();
        failing.expect_name().return_const("otlp");
        failing
            .expect_shutdown()
            .times(1)
            .returning(|| Err(ExportError::Shutdown("timed out".into())));
        let mut healthy = MockLogExporter::new();
        healthy.expect_shutdown().times(1).returning(|| Ok(()));

        let pipeline = LogPipeline::builder(config(Level::Info))
            .with_console(SharedBuffer::default())
            .with_exporters(vec![Box::new(failing), Box::new(healthy)])
            .build();

        let err = pipeline.shutdown().unwrap_err();
        assert!(matches!(err, LoggingError::Export { exporter: "otlp", .. }));
        assert!(pipeline.shutdown().is_ok());
    }

    #[test]
    fn records_after_shutdown_reach_console_only() {
        let console = SharedBuffer::default();
        let recorder = RecordingExporter::default();
        let pipeline = LogPipeline::builder(config(Level::Info))
            .with_console(console.clone())
            .with_exporters(vec![Box::new(recorder.clone())])
            .build();

        pipeline.shutdown().unwrap();
        pipeline.dispatch(&record(Level::Info, "late"));

        assert!(recorder.events().is_empty());
        assert_eq!(console.json_lines()[0]["event"], "late");
        assert!(recorder.was_shut_down());
    }

    #[test]
    fn flush_reports_failures_without_returning_them() {
        let console = SharedBuffer::default();
        let mut exporter = MockLogExporter::new();
        exporter.expect_name().return_const("otlp");
        exporter
            .expect_flush()
            .returning(|| Err(ExportError::Flush("collector gone".into())));

        let pipeline = LogPipeline::builder(config(Level::Info))
            .with_console(console.clone())
            .with_exporters(vec![Box::new(exporter)])
            .build();
        pipeline.flush();

        assert_eq!(console.json_lines()[0]["event"], "Failed to flush log exporter");
        assert_eq!(console.json_lines()[0]["exporter"], json!("otlp"));
    }
}
