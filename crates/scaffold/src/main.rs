//! `scaffold` binary entry point.
//!
//! Startup sequence:
//! 1. Resolve the deployment environment from `APP_ENV`.
//! 2. Initialise application logging from the `LOG_*` / `OTEL_*` variables.
//! 3. Greet, then flush and shut the log exporters down.

use anyhow::{Context, Result};

const DEFAULT_APP_ENV: &str = "development";

// A runtime is needed for the OTLP exporter's gRPC channel.
#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Environment
    // -----------------------------------------------------------------------
    let environment = std::env::var("APP_ENV")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_APP_ENV.to_owned());

    // -----------------------------------------------------------------------
    // 2. Logging
    // -----------------------------------------------------------------------
    let logging = logkit::setup_application_logging(env!("CARGO_PKG_NAME"), &environment)
        .map_err(|e| {
            eprintln!("ERROR: scaffold logging setup failed: {e}");
            e
        })?;

    // -----------------------------------------------------------------------
    // 3. Run
    // -----------------------------------------------------------------------
    logging.get_logger("scaffold.main").info(
        "Hello from scaffold!",
        &[("version", env!("CARGO_PKG_VERSION").into())],
    );

    logging
        .shutdown()
        .context("failed to shut down log exporters")
}
