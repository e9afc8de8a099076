//! Output format for text-oriented sinks
//!
//! - Text: human-readable line (default)
//! - Json: one JSON object per line
//! - Logfmt: key=value pairs

use super::log_event::LogEvent;
use super::property::{format_properties, PropertyValue};
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// `[2025-01-08T10:30:45.123Z] [INFO ] Request processed ProcessId=42`
    #[default]
    Text,

    /// `{"timestamp":"...","level":"INFO","message":"Request processed","ProcessId":42}`
    Json,

    /// `timestamp=... level=INFO message="Request processed" ProcessId=42`
    Logfmt,
}

impl OutputFormat {
    pub fn format(&self, event: &LogEvent, timestamp_format: &TimestampFormat) -> String {
        match self {
            OutputFormat::Text => Self::format_text(event, timestamp_format, event.level.to_str()),
            OutputFormat::Json => Self::format_json(event, timestamp_format),
            OutputFormat::Logfmt => Self::format_logfmt(event, timestamp_format),
        }
    }

    /// Text line with a caller supplied level tag (used for colored output)
    pub(crate) fn format_text(
        event: &LogEvent,
        timestamp_format: &TimestampFormat,
        level_tag: &str,
    ) -> String {
        let mut line = format!(
            "[{}] [{:5}] {}",
            timestamp_format.format(&event.timestamp),
            level_tag,
            event.rendered_message()
        );

        if !event.properties.is_empty() {
            line.push(' ');
            line.push_str(&format_properties(&event.properties));
        }

        if let Some(exception) = event.exception_text() {
            line.push_str(" | ");
            line.push_str(&exception);
        }

        line
    }

    fn format_json(event: &LogEvent, timestamp_format: &TimestampFormat) -> String {
        let mut json_obj = serde_json::Map::new();

        json_obj.insert(
            "timestamp".to_string(),
            timestamp_format.to_json_value(&event.timestamp),
        );
        json_obj.insert(
            "level".to_string(),
            serde_json::Value::String(event.level.to_str().to_string()),
        );
        json_obj.insert(
            "message".to_string(),
            serde_json::Value::String(event.rendered_message()),
        );
        json_obj.insert(
            "template".to_string(),
            serde_json::Value::String(event.template.text().to_string()),
        );
        if let Some(ref exception) = event.exception {
            json_obj.insert(
                "exception".to_string(),
                serde_json::Value::String(exception.clone()),
            );
        }

        for (key, value) in &event.properties {
            json_obj.insert(key.clone(), value.to_json_value());
        }

        serde_json::Value::Object(json_obj).to_string()
    }

    fn format_logfmt(event: &LogEvent, timestamp_format: &TimestampFormat) -> String {
        let mut parts = vec![
            format!(
                "timestamp={}",
                escape_logfmt_value(&timestamp_format.format(&event.timestamp))
            ),
            format!("level={}", event.level.to_str()),
            format!("message={}", quote_logfmt_value(&event.rendered_message())),
        ];

        for (key, value) in &event.properties {
            let formatted = match value {
                PropertyValue::String(s) => escape_logfmt_value(s),
                other => escape_logfmt_value(&other.to_string()),
            };
            parts.push(format!("{}={}", escape_logfmt_key(key), formatted));
        }

        if let Some(exception) = event.exception_text() {
            parts.push(format!("exception={}", quote_logfmt_value(&exception)));
        }

        parts.join(" ")
    }
}

fn escape_logfmt_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

fn escape_logfmt_value(value: &str) -> String {
    if value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '=')
    {
        quote_logfmt_value(value)
    } else {
        value.to_string()
    }
}

fn quote_logfmt_value(value: &str) -> String {
    format!(
        "\"{}\"",
        value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    )
}
