//! Console formatters selected by `LOG_FORMAT`.

use common::{Level, LogRecord};
use console::Style;
use serde_json::Value;

use crate::settings::LogFormat;

/// Width the level column is padded to, e.g. `[info     ]`.
const LEVEL_WIDTH: usize = 9;
/// Width the event column is padded to before the logger name.
const EVENT_WIDTH: usize = 30;

/// Render `record` as a single line, newline included.
pub fn render(format: LogFormat, record: &LogRecord) -> String {
    match format {
        LogFormat::Json => render_json(record),
        LogFormat::Console => render_text(record, true),
        LogFormat::Plain => render_text(record, false),
    }
}

/// One JSON object per line. Shared with the file exporter.
pub fn render_json(record: &LogRecord) -> String {
    let mut line = record.to_json().to_string();
    line.push('\n');
    line
}

fn render_text(record: &LogRecord, ansi: bool) -> String {
    let level = format!("{:<width$}", record.level.as_str(), width = LEVEL_WIDTH);
    let event = format!("{:<width$}", record.event, width = EVENT_WIDTH);

    let mut line = String::with_capacity(128);
    line.push_str(&paint(ansi, Style::new().dim(), &record.timestamp_rfc3339()));
    line.push_str(" [");
    line.push_str(&paint(ansi, level_style(record.level), &level));
    line.push_str("] ");
    line.push_str(&paint(ansi, Style::new().bold(), &event));
    line.push_str(" [");
    line.push_str(&paint(ansi, Style::new().blue().bold(), &record.logger));
    line.push(']');

    for (key, value) in &record.fields {
        line.push(' ');
        line.push_str(&paint(ansi, Style::new().cyan(), key));
        line.push('=');
        line.push_str(&paint(ansi, Style::new().magenta(), &display_value(value)));
    }
    line.push('\n');
    line
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Debug => Style::new().green(),
        Level::Info => Style::new().green().bold(),
        Level::Warning => Style::new().yellow().bold(),
        Level::Error => Style::new().red().bold(),
        Level::Critical => Style::new().white().on_red().bold(),
    }
}

// `LOG_FORMAT=console` colours even when stdout is not a terminal.
fn paint(ansi: bool, style: Style, text: &str) -> String {
    if ansi {
        style.force_styling(true).apply_to(text).to_string()
    } else {
        text.to_owned()
    }
}

/// Strings render bare; everything else renders as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
