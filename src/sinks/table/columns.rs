//! Column model for table sinks
//!
//! Columns are declared up front: a fixed set of standard columns plus
//! additional columns, each bound to one event property with a declared type.
//! Configuration is validated when the writer is built; values are coerced to
//! the declared type when rows are built.

use crate::core::{PropertyValue, Result, RouterError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in columns filled from the event itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardColumn {
    Message,
    MessageTemplate,
    Level,
    TimeStamp,
    Exception,
    Properties,
}

impl StandardColumn {
    pub const ALL: [StandardColumn; 6] = [
        StandardColumn::Message,
        StandardColumn::MessageTemplate,
        StandardColumn::Level,
        StandardColumn::TimeStamp,
        StandardColumn::Exception,
        StandardColumn::Properties,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            StandardColumn::Message => "Message",
            StandardColumn::MessageTemplate => "MessageTemplate",
            StandardColumn::Level => "Level",
            StandardColumn::TimeStamp => "TimeStamp",
            StandardColumn::Exception => "Exception",
            StandardColumn::Properties => "Properties",
        }
    }

    fn schema(&self) -> ColumnSchema {
        let (data_type, data_length, nullable) = match self {
            StandardColumn::Level => (ColumnType::NVarChar, Some(128), false),
            StandardColumn::TimeStamp => (ColumnType::DateTime, None, false),
            StandardColumn::Message | StandardColumn::MessageTemplate => {
                (ColumnType::NVarChar, None, true)
            }
            StandardColumn::Exception | StandardColumn::Properties => {
                (ColumnType::NVarChar, None, true)
            }
        };
        ColumnSchema {
            name: self.column_name().to_string(),
            data_type,
            data_length,
            nullable,
        }
    }
}

/// Declared storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    BigInt,
    Int,
    Float,
    Bit,
    NVarChar,
    DateTime,
}

impl ColumnType {
    /// Portable SQL type declaration; unbounded text has no length argument
    pub fn sql_type(&self, data_length: Option<u32>) -> String {
        match self {
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Int => "INT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Bit => "BIT".to_string(),
            ColumnType::NVarChar => match data_length {
                Some(len) => format!("NVARCHAR({})", len),
                None => "NVARCHAR".to_string(),
            },
            ColumnType::DateTime => "DATETIME".to_string(),
        }
    }

    /// Inverse of [`sql_type`](Self::sql_type), tolerant of common aliases
    pub fn from_sql_type(sql: &str) -> Option<Self> {
        let upper = sql.trim().to_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();
        match base {
            "BIGINT" => Some(ColumnType::BigInt),
            "INT" | "INTEGER" | "SMALLINT" => Some(ColumnType::Int),
            "FLOAT" | "REAL" | "DOUBLE" => Some(ColumnType::Float),
            "BIT" | "BOOLEAN" | "BOOL" => Some(ColumnType::Bit),
            "NVARCHAR" | "VARCHAR" | "TEXT" => Some(ColumnType::NVarChar),
            "DATETIME" | "DATETIME2" | "TIMESTAMP" => Some(ColumnType::DateTime),
            _ => None,
        }
    }

    /// Coerce a property value to this type; `Null` when it does not fit
    pub fn coerce(&self, value: &PropertyValue, data_length: Option<u32>) -> PropertyValue {
        use PropertyValue as V;
        match (self, value) {
            (_, V::Null) => V::Null,

            (ColumnType::BigInt, V::Int(i)) => V::Int(*i),
            (ColumnType::BigInt, V::Float(f)) => float_to_int(*f).map_or(V::Null, V::Int),
            (ColumnType::BigInt, V::Bool(b)) => V::Int(i64::from(*b)),
            (ColumnType::BigInt, V::String(s)) => s.trim().parse().map_or(V::Null, V::Int),

            (ColumnType::Int, other) => match ColumnType::BigInt.coerce(other, None) {
                V::Int(i) if i32::try_from(i).is_ok() => V::Int(i),
                _ => V::Null,
            },

            (ColumnType::Float, V::Float(f)) => V::Float(*f),
            (ColumnType::Float, V::Int(i)) => V::Float(*i as f64),
            (ColumnType::Float, V::String(s)) => s.trim().parse().map_or(V::Null, V::Float),

            (ColumnType::Bit, V::Bool(b)) => V::Bool(*b),
            (ColumnType::Bit, V::Int(0)) => V::Bool(false),
            (ColumnType::Bit, V::Int(1)) => V::Bool(true),
            (ColumnType::Bit, V::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => V::Bool(true),
                "false" | "0" => V::Bool(false),
                _ => V::Null,
            },

            (ColumnType::DateTime, V::Timestamp(ts)) => V::Timestamp(*ts),
            (ColumnType::DateTime, V::String(s)) => DateTime::parse_from_rfc3339(s.trim())
                .map_or(V::Null, |ts| V::Timestamp(ts.with_timezone(&Utc))),

            (ColumnType::NVarChar, other) => V::String(truncate(other.to_string(), data_length)),

            _ => V::Null,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_type(None))
    }
}

fn float_to_int(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn truncate(s: String, data_length: Option<u32>) -> String {
    match data_length {
        Some(len) if s.chars().count() > len as usize => s.chars().take(len as usize).collect(),
        _ => s,
    }
}

/// An additional column populated from a named event property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnDefinition {
    pub column_name: String,
    /// Source property; defaults to the column name
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default = "default_column_type")]
    pub data_type: ColumnType,
    #[serde(default)]
    pub data_length: Option<u32>,
    #[serde(default = "default_true")]
    pub allow_null: bool,
}

fn default_column_type() -> ColumnType {
    ColumnType::NVarChar
}

fn default_true() -> bool {
    true
}

impl ColumnDefinition {
    /// NVARCHAR column filled from the property of the same name
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            property_name: None,
            data_type: ColumnType::NVarChar,
            data_length: None,
            allow_null: true,
        }
    }

    #[must_use]
    pub fn with_property(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = Some(property_name.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, data_type: ColumnType) -> Self {
        self.data_type = data_type;
        self
    }

    #[must_use]
    pub fn with_length(mut self, data_length: u32) -> Self {
        self.data_length = Some(data_length);
        self
    }

    pub fn property_name(&self) -> &str {
        self.property_name.as_deref().unwrap_or(&self.column_name)
    }
}

/// Which standard columns are stored and which additional columns exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnOptions {
    #[serde(default = "default_store")]
    pub store: Vec<StandardColumn>,
    #[serde(default)]
    pub additional_columns: Vec<ColumnDefinition>,
}

fn default_store() -> Vec<StandardColumn> {
    StandardColumn::ALL.to_vec()
}

impl Default for ColumnOptions {
    fn default() -> Self {
        Self {
            store: default_store(),
            additional_columns: Vec::new(),
        }
    }
}

impl ColumnOptions {
    /// Stop storing a standard column
    #[must_use]
    pub fn remove(mut self, column: StandardColumn) -> Self {
        self.store.retain(|c| *c != column);
        self
    }

    #[must_use]
    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.additional_columns.push(column);
        self
    }

    /// Reject invalid, duplicate or colliding column declarations
    pub fn validate(&self) -> Result<()> {
        if self.store.is_empty() && self.additional_columns.is_empty() {
            return Err(RouterError::config("ColumnOptions", "no columns to store"));
        }

        let mut seen: Vec<String> = Vec::new();
        let standard = self.store.iter().map(|c| c.column_name().to_string());
        let additional = self.additional_columns.iter().map(|c| c.column_name.clone());

        for name in standard.chain(additional) {
            validate_identifier("ColumnOptions", &name)?;
            let lower = name.to_lowercase();
            if seen.contains(&lower) {
                return Err(RouterError::config(
                    "ColumnOptions",
                    format!("duplicate column '{}'", name),
                ));
            }
            seen.push(lower);
        }

        for column in &self.additional_columns {
            if column.property_name().is_empty() {
                return Err(RouterError::config(
                    "ColumnOptions",
                    format!("column '{}' has an empty property name", column.column_name),
                ));
            }
            match (column.data_type, column.data_length) {
                (ColumnType::NVarChar, Some(0)) => {
                    return Err(RouterError::config(
                        "ColumnOptions",
                        format!("column '{}' has zero length", column.column_name),
                    ))
                }
                (ColumnType::NVarChar, _) | (_, None) => {}
                (other, Some(_)) => {
                    return Err(RouterError::config(
                        "ColumnOptions",
                        format!(
                            "column '{}' of type {} cannot have a length",
                            column.column_name, other
                        ),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Expected schema of `table`, standard columns first
    pub fn schema(&self, table: &str) -> TableSchema {
        let standard = StandardColumn::ALL
            .iter()
            .filter(|c| self.store.contains(c))
            .map(StandardColumn::schema);
        let additional = self.additional_columns.iter().map(|c| ColumnSchema {
            name: c.column_name.clone(),
            data_type: c.data_type,
            data_length: c.data_length,
            nullable: c.allow_null,
        });

        TableSchema {
            name: table.to_string(),
            columns: standard.chain(additional).collect(),
        }
    }
}

/// Identifiers are interpolated into SQL, so only `[A-Za-z_][A-Za-z0-9_]*` is allowed
pub(crate) fn validate_identifier(component: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') || name.len() > 128 {
        return Err(RouterError::config(
            component,
            format!("'{}' is not a valid identifier", name),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: ColumnType,
    pub data_length: Option<u32>,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Check that `actual` has every column of `self` with the same type
    pub fn check_compatible(&self, actual: &TableSchema) -> Result<()> {
        for expected in &self.columns {
            match actual.column(&expected.name) {
                None => {
                    return Err(RouterError::schema_mismatch(
                        &self.name,
                        format!("missing column '{}'", expected.name),
                    ))
                }
                Some(found) if found.data_type != expected.data_type => {
                    return Err(RouterError::schema_mismatch(
                        &self.name,
                        format!(
                            "column '{}' is {} but {} is required",
                            expected.name, found.data_type, expected.data_type
                        ),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
