//! Log event structure

use super::log_level::LogLevel;
use super::property::{Properties, PropertyValue};
use super::template::MessageTemplate;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single log event
///
/// Built by the router at the call site, enriched once, then shared
/// read-only between sinks.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    /// Monotonic per-router identifier, usable as a row idempotency key
    pub event_id: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub template: MessageTemplate,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<PropertyValue>,
    pub properties: Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Logged by the error handler; its own failures are not reported back
    #[serde(skip)]
    from_error_handler: bool,
}

impl LogEvent {
    /// Sanitize a rendered message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// so that one event can never forge a second line in text output.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(event_id: u64, level: LogLevel, template: impl Into<MessageTemplate>) -> Self {
        Self {
            event_id,
            timestamp: Utc::now(),
            level,
            template: template.into(),
            args: Vec::new(),
            properties: Properties::new(),
            exception: None,
            from_error_handler: false,
        }
    }

    /// Attach positional arguments; named template holes capture them as properties
    pub fn with_args(mut self, args: Vec<PropertyValue>) -> Self {
        self.template.capture(&args, &mut self.properties);
        self.args = args;
        self
    }

    /// Merge caller supplied properties, overwriting same-named ones
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub(crate) fn mark_from_error_handler(&mut self) {
        self.from_error_handler = true;
    }

    pub(crate) fn from_error_handler(&self) -> bool {
        self.from_error_handler
    }

    /// Set or overwrite a property
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Template rendered against the event's properties and arguments, sanitized
    pub fn rendered_message(&self) -> String {
        Self::sanitize_message(&self.template.render(&self.args, &self.properties))
    }

    /// Exception text with the same sanitization as the message
    pub fn exception_text(&self) -> Option<String> {
        self.exception.as_deref().map(Self::sanitize_message)
    }
}
