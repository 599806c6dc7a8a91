//! Process-wide logging setup.
//!
//! [`configure_logging`] builds the [`LogPipeline`], installs the `tracing`
//! bridge as the global subscriber and registers the pipeline for
//! [`get_logger`]. It succeeds once per process.

use std::sync::{Arc, OnceLock};

use common::{Level, LoggingError};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{bridge::PipelineLayer, logger::Logger, pipeline::LogPipeline, settings::LoggingConfig};

static INSTALLED: OnceLock<Arc<LogPipeline>> = OnceLock::new();
static UNCONFIGURED: OnceLock<Arc<LogPipeline>> = OnceLock::new();

/// Owner of the installed pipeline. Dropping it shuts the exporters down.
///
/// The pipeline stays installed after shutdown: [`get_logger`] and the
/// `tracing` bridge keep working, but their records reach the console only.
/// A process cannot reconfigure logging once it has been installed.
#[derive(Debug)]
pub struct Logging {
    pipeline: Arc<LogPipeline>,
}

impl Logging {
    pub fn get_logger(&self, name: &str) -> Logger {
        self.pipeline.logger(name)
    }

    pub fn config(&self) -> &LoggingConfig {
        self.pipeline.config()
    }

    pub fn pipeline(&self) -> &Arc<LogPipeline> {
        &self.pipeline
    }

    /// Flush and shut down every exporter. Later records go to the console
    /// only. Calling it again, or dropping `self` afterwards, does nothing.
    ///
    /// # Errors
    ///
    /// Returns the first exporter shutdown failure.
    pub fn shutdown(self) -> Result<(), LoggingError> {
        self.pipeline.shutdown()
    }
}

impl Drop for Logging {
    fn drop(&mut self) {
        let _ = self.pipeline.shutdown();
    }
}

/// Install `config` as the process-wide logging setup.
///
/// The `tracing` filter comes from `RUST_LOG` when set, else from
/// `config.level`.
///
/// # Errors
///
/// [`LoggingError::AlreadyInitialized`] on a second call, or
/// [`LoggingError::Subscriber`] if another global `tracing` subscriber is
/// already installed.
pub fn configure_logging(config: LoggingConfig) -> Result<Logging, LoggingError> {
    if INSTALLED.get().is_some() {
        return Err(LoggingError::AlreadyInitialized);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_directive(config.level)));
    let pipeline = Arc::new(LogPipeline::new(config));

    tracing_subscriber::registry()
        .with(filter)
        .with(PipelineLayer::new(Arc::clone(&pipeline)))
        .try_init()
        .map_err(|e| LoggingError::Subscriber(e.to_string()))?;

    INSTALLED
        .set(Arc::clone(&pipeline))
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(Logging { pipeline })
}

/// Load the configuration from the environment, label it with
/// `environment` and install it. Logs an initialisation record through the
/// `app_name` logger.
///
/// # Errors
///
/// See [`configure_logging`].
pub fn setup_application_logging(
    app_name: &str,
    environment: &str,
) -> Result<Logging, LoggingError> {
    let logging = configure_logging(LoggingConfig::from_env().with_environment(environment))?;

    let config = logging.config();
    let sinks: Vec<Value> = logging
        .pipeline()
        .exporter_names()
        .into_iter()
        .map(Value::from)
        .collect();
    logging.get_logger(app_name).info(
        "Application logging initialized",
        &[
            ("environment", Value::from(environment)),
            ("log_level", Value::from(config.level.as_upper())),
            ("export_mode", Value::from(config.export_mode.as_str())),
            ("sinks", Value::Array(sinks)),
        ],
    );

    Ok(logging)
}

/// Return a logger named `name`.
///
/// Before [`configure_logging`] has run, records go to a console-only
/// pipeline configured from the environment. After the [`Logging`] handle
/// has been shut down or dropped, records still pass the installed level
/// filter and reach the console, but no exporter.
pub fn get_logger(name: &str) -> Logger {
    installed_or_unconfigured().logger(name)
}

fn installed_or_unconfigured() -> &'static Arc<LogPipeline> {
    INSTALLED.get().unwrap_or_else(|| {
        UNCONFIGURED.get_or_init(|| {
            Arc::new(
                LogPipeline::builder(LoggingConfig::from_env())
                    .with_exporters(Vec::new())
                    .build(),
            )
        })
    })
}

fn tracing_directive(level: Level) -> &'static str {
    match level {
        Level::Debug => "debug",
        Level::Info => "info",
        Level::Warning => "warn",
        Level::Error | Level::Critical => "error",
    }
}
