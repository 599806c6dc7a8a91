//! `tracing` bridge: a [`Layer`] that turns `tracing` events into
//! [`LogRecord`]s and dispatches them through a [`LogPipeline`].
//!
//! The event's target becomes the logger name, its `message` field the event
//! text, and every other field a record field. Fields recorded on the spans
//! enclosing the event are merged in first, root span outermost, so a span
//! acts as bound context for everything logged inside it.

use std::{fmt, sync::Arc};

use common::{Fields, Level, LogRecord};
use serde_json::Value;
use tracing::{
    field::{Field, Visit},
    span::{Attributes, Id, Record},
    Event, Subscriber,
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use crate::pipeline::LogPipeline;

/// Crates whose events describe the export path itself. They are written to
/// the console only.
const TRANSPORT_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "tonic", "tower", "reqwest"];

/// Routes `tracing` events into a [`LogPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineLayer {
    pipeline: Arc<LogPipeline>,
}

impl PipelineLayer {
    pub fn new(pipeline: Arc<LogPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Span fields, stored in the span's extensions.
struct SpanFields(Fields);

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
            fields.extend(visitor.fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = level_of(meta.level());
        if !self.pipeline.enabled(level) {
            return;
        }

        let mut fields = Fields::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(SpanFields(span_fields)) = extensions.get::<SpanFields>() {
                    fields.extend(span_fields.clone());
                }
            }
        }

        let mut visitor = FieldVisitor::capturing_message();
        event.record(&mut visitor);
        fields.extend(visitor.fields);

        // OpenTelemetry's internal events carry their name in a `name` field.
        let message = visitor.message.unwrap_or_else(|| {
            fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_else(|| meta.name())
                .to_owned()
        });
        let record = LogRecord::new(level, meta.target(), message, fields);
        if is_transport_target(meta.target()) {
            self.pipeline.dispatch_console(&record);
        } else {
            self.pipeline.dispatch(&record);
        }
    }
}

fn level_of(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        tracing::Level::DEBUG | tracing::Level::TRACE => Level::Debug,
    }
}

fn is_transport_target(target: &str) -> bool {
    let root = target.split("::").next().unwrap_or(target);
    root.starts_with("opentelemetry") || TRANSPORT_TARGETS.contains(&root)
}

/// Collects `tracing` fields as JSON values.
#[derive(Default)]
struct FieldVisitor {
    fields: Fields,
    message: Option<String>,
    capture_message: bool,
}

impl FieldVisitor {
    fn capturing_message() -> Self {
        Self {
            capture_message: true,
            ..Self::default()
        }
    }

    fn put(&mut self, field: &Field, value: Value) {
        if self.capture_message && field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.put(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::from(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        settings::LoggingConfig,
        test_support::{RecordingExporter, SharedBuffer},
    };
    use tracing_subscriber::layer::SubscriberExt;

    fn bridged(level: Level) -> (RecordingExporter, SharedBuffer, impl Subscriber + Send + Sync) {
        let recorder = RecordingExporter::default();
        let console = SharedBuffer::default();
        let cfg = LoggingConfig {
            level,
            ..LoggingConfig::default()
        };
        let pipeline = LogPipeline::builder(cfg)
            .with_console(console.clone())
            .with_exporters(vec![Box::new(recorder.clone())])
            .build();
        let subscriber =
            tracing_subscriber::registry().with(PipelineLayer::new(Arc::new(pipeline)));
        (recorder, console, subscriber)
    }

    #[test]
    fn event_becomes_record() {
        let (recorder, _, subscriber) = bridged(Level::Debug);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(
                target: "billing",
                user_id = "u1",
                attempts = 3,
                ok = false,
                "Charge declined"
            );
        });

        let records = recorder.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.level, Level::Warning);
        assert_eq!(record.logger, "billing");
        assert_eq!(record.event, "Charge declined");
        assert_eq!(record.fields["user_id"], "u1");
        assert_eq!(record.fields["attempts"], 3);
        assert_eq!(record.fields["ok"], false);
        assert!(!record.fields.contains_key("message"));
    }

    #[test]
    fn span_fields_act_as_bound_context() {
        let (recorder, _, subscriber) = bridged(Level::Info);
        tracing::subscriber::with_default(subscriber, || {
            let outer = tracing::info_span!("request", request_id = "req_123", step = 1);
            let _outer = outer.enter();
            let inner = tracing::info_span!("db", step = 2, table = tracing::field::Empty);
            inner.record("table", "users");
            let _inner = inner.enter();
            tracing::info!(step = 3, "query");
            tracing::info!("no override");
        });

        let records = recorder.records();
        assert_eq!(records[0].fields["request_id"], "req_123");
        assert_eq!(records[0].fields["table"], "users");
        assert_eq!(records[0].fields["step"], 3);
        assert_eq!(records[1].fields["step"], 2);
    }

    #[test]
    fn trace_maps_to_debug_and_is_filtered_by_level() {
        let (recorder, _, subscriber) = bridged(Level::Info);
        tracing::subscriber::with_default(subscriber, || {
            tracing::trace!("hidden");
            tracing::debug!("hidden");
            tracing::error!("shown");
        });
        assert_eq!(recorder.events(), ["shown"]);
        assert_eq!(level_of(&tracing::Level::TRACE), Level::Debug);
    }

    #[test]
    fn transport_events_reach_console_only() {
        let (recorder, console, subscriber) = bridged(Level::Info);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "opentelemetry_sdk::logs", "BatchLogProcessor dropped logs");
            tracing::warn!(target: "h2::codec", "connection reset");
        });

        assert!(recorder.records().is_empty());
        let lines = console.json_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["logger"], "opentelemetry_sdk::logs");
    }

    #[test]
    fn named_events_without_message_keep_their_name() {
        let (recorder, console, subscriber) = bridged(Level::Info);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(
                target: "opentelemetry_sdk",
                name = "BatchLogProcessor.ExportError",
                error = "connection refused"
            );
            tracing::info!(target: "billing", attempts = 2);
        });

        let lines = console.json_lines();
        assert_eq!(lines[0]["event"], "BatchLogProcessor.ExportError");
        assert_eq!(lines[0]["error"], "connection refused");

        let records = recorder.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].event.starts_with("event "), "{}", records[0].event);
        assert_eq!(records[0].fields["attempts"], 2);
    }

    #[test]
    fn transport_target_matching() {
        assert!(is_transport_target("opentelemetry"));
        assert!(is_transport_target("opentelemetry_otlp::exporter"));
        assert!(is_transport_target("tonic::transport"));
        assert!(is_transport_target("hyper_util::client"));
        assert!(!is_transport_target("h2o"));
        assert!(!is_transport_target("scaffold::files"));
    }

    #[test]
    fn error_and_debug_values_are_stringified() {
        let (recorder, _, subscriber) = bridged(Level::Info);
        let err = std::io::Error::other("boom");
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(error = &err as &dyn std::error::Error, items = ?vec![1, 2], "failed");
        });

        let record = &recorder.records()[0];
        assert_eq!(record.fields["error"], "boom");
        assert_eq!(record.fields["items"], "[1, 2]");
    }
}
