//! [`OtlpLogExporter`]: ships records to an OpenTelemetry collector over
//! OTLP/gRPC.
//!
//! Records are handed to the SDK's batch processor, which exports from its
//! own worker; [`LogExporter::export`] therefore never waits on the network.
//! An unreachable collector costs dropped batches, never a blocked caller.

use std::{collections::HashMap, time::SystemTime};

use common::{Level, LogRecord};
use opentelemetry::{
    logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _, Severity},
    Key, KeyValue,
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    logs::{SdkLogger, SdkLoggerProvider},
    Resource,
};
use serde_json::Value;

use super::{ExportError, LogExporter};
use crate::settings::LoggingConfig;

/// Resource attribute carrying the deployment environment label.
const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment.name";

/// Instrumentation scope name reported on every exported record.
const SCOPE_NAME: &str = "logkit";

/// Exports records through an SDK logger provider with a batch processor.
pub struct OtlpLogExporter {
    endpoint: String,
    provider: SdkLoggerProvider,
    logger: SdkLogger,
}

impl OtlpLogExporter {
    /// Build an exporter for the endpoint, service and timeout in `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::NoRuntime`] outside a Tokio runtime (the gRPC
    /// channel is driven by it), or [`ExportError::Build`] if the OTLP
    /// exporter rejects its configuration.
    pub fn from_config(cfg: &LoggingConfig) -> Result<Self, ExportError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ExportError::NoRuntime);
        }

        let exporter = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(cfg.otel_endpoint.clone())
            .with_timeout(cfg.export_timeout())
            .build()
            .map_err(|e| ExportError::Build {
                endpoint: cfg.otel_endpoint.clone(),
                message: e.to_string(),
            })?;

        let provider = SdkLoggerProvider::builder()
            .with_resource(service_resource(
                &cfg.service_name,
                cfg.environment.as_deref(),
            ))
            .with_batch_exporter(exporter)
            .build();
        let logger = provider.logger(SCOPE_NAME);

        Ok(Self {
            endpoint: cfg.otel_endpoint.clone(),
            provider,
            logger,
        })
    }

    /// Collector endpoint this exporter sends to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for OtlpLogExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtlpLogExporter")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl LogExporter for OtlpLogExporter {
    fn name(&self) -> &'static str {
        "otlp"
    }

    fn export(&self, record: &LogRecord) -> Result<(), ExportError> {
        let mut otel = self.logger.create_log_record();
        otel.set_timestamp(SystemTime::from(record.timestamp));
        otel.set_observed_timestamp(SystemTime::now());
        otel.set_severity_number(severity(record.level));
        otel.set_severity_text(record.level.as_upper());
        otel.set_body(AnyValue::String(record.event.clone().into()));
        otel.add_attribute("logger.name", AnyValue::String(record.logger.clone().into()));
        for (key, value) in &record.fields {
            if let Some(value) = any_value(value) {
                otel.add_attribute(Key::new(key.clone()), value);
            }
        }
        self.logger.emit(otel);
        Ok(())
    }

    fn flush(&self) -> Result<(), ExportError> {
        self.provider
            .force_flush()
            .map_err(|e| ExportError::Flush(e.to_string()))
    }

    fn shutdown(&self) -> Result<(), ExportError> {
        self.provider
            .shutdown()
            .map_err(|e| ExportError::Shutdown(e.to_string()))
    }
}

fn service_resource(service_name: &str, environment: Option<&str>) -> Resource {
    let mut attributes = vec![KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
        env!("CARGO_PKG_VERSION"),
    )];
    if let Some(environment) = environment {
        attributes.push(KeyValue::new(DEPLOYMENT_ENVIRONMENT, environment.to_owned()));
    }
    Resource::builder()
        .with_service_name(service_name.to_owned())
        .with_attributes(attributes)
        .build()
}

fn severity(level: Level) -> Severity {
    match level {
        Level::Debug => Severity::Debug,
        Level::Info => Severity::Info,
        Level::Warning => Severity::Warn,
        Level::Error => Severity::Error,
        Level::Critical => Severity::Fatal,
    }
}

/// Convert a JSON field to an OTLP attribute value. `null` has no OTLP
/// counterpart and is dropped.
fn any_value(value: &Value) -> Option<AnyValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(AnyValue::Boolean(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(AnyValue::Int(i)),
            None => n.as_f64().map(AnyValue::Double),
        },
        Value::String(s) => Some(AnyValue::String(s.clone().into())),
        Value::Array(items) => Some(AnyValue::ListAny(Box::new(
            items.iter().filter_map(any_value).collect(),
        ))),
        Value::Object(map) => Some(AnyValue::Map(Box::new(
            map.iter()
                .filter_map(|(k, v)| any_value(v).map(|v| (Key::new(k.clone()), v)))
                .collect::<HashMap<Key, AnyValue>>(),
        ))),
    }
}
