//! Property values carried by log events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Property map of a log event. Keys are unique; a later insert overwrites.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Value type for event arguments and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    Null,
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            PropertyValue::Null => write!(f, "null"),
        }
    }
}

impl PropertyValue {
    /// Convert to serde_json::Value for JSON serialization
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            PropertyValue::String(s) => serde_json::Value::String(s.clone()),
            PropertyValue::Int(i) => serde_json::Value::Number((*i).into()),
            PropertyValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            PropertyValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            PropertyValue::Null => serde_json::Value::Null,
        }
    }

    /// Render for `key=value` output
    ///
    /// Strings with whitespace, quotes or control characters are quoted and
    /// escaped, so a value can never start a new line.
    pub fn to_field_string(&self) -> String {
        match self {
            PropertyValue::String(s) if needs_quoting(s) => format!("{:?}", s),
            other => other.to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<&String> for PropertyValue {
    fn from(s: &String) -> Self {
        PropertyValue::String(s.clone())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Int(i64::from(i))
    }
}

impl From<u32> for PropertyValue {
    fn from(i: u32) -> Self {
        PropertyValue::Int(i64::from(i))
    }
}

impl From<u64> for PropertyValue {
    fn from(i: u64) -> Self {
        i64::try_from(i)
            .map(PropertyValue::Int)
            .unwrap_or(PropertyValue::Float(i as f64))
    }
}

impl From<usize> for PropertyValue {
    fn from(i: usize) -> Self {
        PropertyValue::from(i as u64)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(ts: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(ts)
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropertyValue::Null, Into::into)
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '=')
}

/// Format properties as space separated `key=value` pairs
pub fn format_properties(properties: &Properties) -> String {
    properties
        .iter()
        .map(|(k, v)| format!("{}={}", k.escape_debug(), v.to_field_string()))
        .collect::<Vec<_>>()
        .join(" ")
}
