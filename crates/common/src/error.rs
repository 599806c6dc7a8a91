//! Common error types shared across crates.

use thiserror::Error;

/// Top-level logging error type.
///
/// Configuration problems are never reported here: malformed environment
/// values fall back to their defaults instead.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Process-wide logging has already been configured.
    #[error("logging already initialised")]
    AlreadyInitialized,

    /// The global `tracing` subscriber could not be installed.
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),

    /// An exporter failed while flushing or shutting down.
    #[error("{exporter} exporter failed: {message}")]
    Export {
        /// Short exporter name, e.g. `"file"` or `"otlp"`.
        exporter: &'static str,
        /// Human-readable failure description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_initialised_message() {
        assert_eq!(
            LoggingError::AlreadyInitialized.to_string(),
            "logging already initialised"
        );
    }

    #[test]
    fn display_includes_exporter_and_message() {
        let e = LoggingError::Export {
            exporter: "file",
            message: "disk full".into(),
        };
        let text = e.to_string();
        assert!(text.contains("file"));
        assert!(text.contains("disk full"));
    }
}
