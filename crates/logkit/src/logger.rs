//! Named, context-bindable logger handles.

use std::{fmt, sync::Arc, time::Instant};

use common::{Fields, Level, LogRecord};
use serde_json::Value;

use crate::pipeline::LogPipeline;

/// A named emitter of structured records.
///
/// Handles are cheap to clone and safe to share across threads. Binding
/// context returns a new handle; the handle it was called on is unchanged.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    context: Arc<Fields>,
    pipeline: Arc<LogPipeline>,
}

impl Logger {
    pub(crate) fn new(pipeline: Arc<LogPipeline>, name: &str) -> Self {
        Self {
            name: Arc::from(name),
            context: Arc::new(Fields::new()),
            pipeline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context carried into every record emitted through this handle.
    pub fn context(&self) -> &Fields {
        &self.context
    }

    /// Return a handle that adds `context` to every record it emits.
    ///
    /// Keys already bound are overwritten in the returned handle.
    ///
    /// ```ignore
    /// let request_log = log.bind([("request_id", "req_123")]);
    /// request_log.info("Processing request", &[]);
    /// ```
    pub fn bind<I, K, V>(&self, context: I) -> Logger
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut merged = (*self.context).clone();
        for (key, value) in context {
            merged.insert(key.into(), value.into());
        }
        self.with_context(merged)
    }

    /// Return a handle without the named keys.
    pub fn unbind(&self, keys: &[&str]) -> Logger {
        let mut remaining = (*self.context).clone();
        for key in keys {
            remaining.remove(*key);
        }
        self.with_context(remaining)
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        self.pipeline.enabled(level)
    }

    /// Emit `event` at `level`. Call-site `fields` win over bound context.
    pub fn log(&self, level: Level, event: &str, fields: &[(&str, Value)]) {
        if !self.pipeline.enabled(level) {
            return;
        }
        let mut merged = (*self.context).clone();
        for (key, value) in fields {
            merged.insert((*key).to_owned(), value.clone());
        }
        self.pipeline
            .dispatch(&LogRecord::new(level, &*self.name, event, merged));
    }

    pub fn debug(&self, event: &str, fields: &[(&str, Value)]) {
        self.log(Level::Debug, event, fields);
    }

    pub fn info(&self, event: &str, fields: &[(&str, Value)]) {
        self.log(Level::Info, event, fields);
    }

    pub fn warning(&self, event: &str, fields: &[(&str, Value)]) {
        self.log(Level::Warning, event, fields);
    }

    pub fn error(&self, event: &str, fields: &[(&str, Value)]) {
        self.log(Level::Error, event, fields);
    }

    pub fn critical(&self, event: &str, fields: &[(&str, Value)]) {
        self.log(Level::Critical, event, fields);
    }

    fn with_context(&self, context: Fields) -> Logger {
        Logger {
            name: Arc::clone(&self.name),
            context: Arc::new(context),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Run `f`, logging its start at debug and its duration at info.
pub fn log_performance<T>(logger: &Logger, operation: &str, f: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    logger.debug("Starting operation", &[("operation", Value::from(operation))]);

    let result = f();

    let duration_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    logger.info(
        "Operation completed",
        &[
            ("operation", Value::from(operation)),
            ("duration_ms", Value::from(duration_ms)),
        ],
    );
    result
}
