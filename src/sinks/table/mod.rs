//! Table sink: persists events as rows of a relational table
//!
//! Rows are buffered and inserted in batches. The table is checked (and
//! optionally created) on the first write; a table that exists with missing
//! or differently typed columns is a [`RouterError::SchemaMismatch`].

pub mod columns;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

pub use columns::{
    ColumnDefinition, ColumnOptions, ColumnSchema, ColumnType, StandardColumn, TableSchema,
};
pub use memory::{MemoryTable, MemoryTableStore};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTableStore;
pub use store::{Row, TableStore};

use crate::core::{LogEvent, PropertyValue, Result, RouterError, SinkWriter};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TABLE_NAME: &str = "Logs";
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TableWriterOptions {
    pub table_name: String,
    /// Create the table when it does not exist
    pub auto_create_table: bool,
    /// Rows buffered before an insert; flush inserts whatever is buffered
    pub batch_size: usize,
    pub column_options: ColumnOptions,
}

impl Default for TableWriterOptions {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            auto_create_table: false,
            batch_size: DEFAULT_BATCH_SIZE,
            column_options: ColumnOptions::default(),
        }
    }
}

impl TableWriterOptions {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn auto_create_table(mut self, enabled: bool) -> Self {
        self.auto_create_table = enabled;
        self
    }

    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    #[must_use]
    pub fn column_options(mut self, options: ColumnOptions) -> Self {
        self.column_options = options;
        self
    }

    pub fn validate(&self) -> Result<()> {
        columns::validate_identifier("TableWriter", &self.table_name)?;
        if self.batch_size == 0 {
            return Err(RouterError::config("TableWriter", "batch size must be at least 1"));
        }
        self.column_options.validate()
    }
}

/// Where each column's value comes from
#[derive(Debug, Clone)]
enum Binding {
    Standard(StandardColumn),
    Property {
        name: String,
        data_type: ColumnType,
        data_length: Option<u32>,
    },
}

pub struct TableWriter {
    schema: TableSchema,
    bindings: Vec<Binding>,
    auto_create_table: bool,
    batch_size: usize,
    store: Box<dyn TableStore>,
    table_ready: bool,
    buffer: Vec<Row>,
    closed: bool,
}

impl TableWriter {
    /// Validates the column configuration; the store is not touched until
    /// the first write
    pub fn new<S: TableStore + 'static>(store: S, options: TableWriterOptions) -> Result<Self> {
        Self::with_boxed_store(Box::new(store), options)
    }

    pub fn with_boxed_store(store: Box<dyn TableStore>, options: TableWriterOptions) -> Result<Self> {
        options.validate()?;

        let columns = &options.column_options;
        let standard = StandardColumn::ALL
            .iter()
            .filter(|c| columns.store.contains(c))
            .map(|c| Binding::Standard(*c));
        let additional = columns.additional_columns.iter().map(|c| Binding::Property {
            name: c.property_name().to_string(),
            data_type: c.data_type,
            data_length: c.data_length,
        });
        let bindings = standard.chain(additional).collect();

        Ok(Self {
            schema: columns.schema(&options.table_name),
            bindings,
            auto_create_table: options.auto_create_table,
            batch_size: options.batch_size,
            store,
            table_ready: false,
            buffer: Vec::with_capacity(options.batch_size),
            closed: false,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Rows waiting for the next insert
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn ensure_table(&mut self) -> Result<()> {
        if self.table_ready {
            return Ok(());
        }

        match self.store.table_schema(&self.schema.name)? {
            Some(actual) => self.schema.check_compatible(&actual)?,
            None if self.auto_create_table => self.store.create_table(&self.schema)?,
            None => {
                return Err(RouterError::schema_mismatch(
                    &self.schema.name,
                    "table does not exist and auto-create is disabled",
                ))
            }
        }
        self.table_ready = true;
        Ok(())
    }

    fn row(&self, event: &LogEvent) -> Row {
        self.bindings
            .iter()
            .map(|binding| match binding {
                Binding::Standard(column) => standard_value(*column, event),
                Binding::Property {
                    name,
                    data_type,
                    data_length,
                } => event
                    .property(name)
                    .map_or(PropertyValue::Null, |v| data_type.coerce(v, *data_length)),
            })
            .collect()
    }

    /// Insert the buffer; on failure the batch is discarded
    fn insert_buffered(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.buffer);
        self.store.insert_rows(&self.schema, &rows)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(RouterError::writer("Table writer already closed"));
        }
        Ok(())
    }
}

fn standard_value(column: StandardColumn, event: &LogEvent) -> PropertyValue {
    match column {
        StandardColumn::Message => event.template.render(&event.args, &event.properties).into(),
        StandardColumn::MessageTemplate => event.template.text().into(),
        StandardColumn::Level => event.level.name().into(),
        StandardColumn::TimeStamp => PropertyValue::Timestamp(event.timestamp),
        StandardColumn::Exception => event.exception.clone().into(),
        StandardColumn::Properties => {
            let object: serde_json::Map<String, serde_json::Value> = event
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json_value()))
                .collect();
            serde_json::Value::Object(object).to_string().into()
        }
    }
}

impl SinkWriter for TableWriter {
    fn write(&mut self, event: &LogEvent) -> Result<()> {
        self.check_open()?;
        self.ensure_table()?;

        let row = self.row(event);
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.insert_buffered()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.ensure_table()?;
        self.insert_buffered()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let flushed = self.flush();
        self.closed = true;
        self.buffer.clear();
        let released = self.store.close();
        flushed.and(released)
    }

    fn name(&self) -> &str {
        "table"
    }
}

impl Drop for TableWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogLevel;

    fn sample_options() -> TableWriterOptions {
        TableWriterOptions::new("Logs")
            .auto_create_table(true)
            .batch_size(1)
            .column_options(
                ColumnOptions::default()
                    .remove(StandardColumn::MessageTemplate)
                    .with_column(ColumnDefinition::new("ProcessId").with_type(ColumnType::BigInt))
                    .with_column(ColumnDefinition::new("Version").with_length(32)),
            )
    }

    fn sample_event(id: u64) -> LogEvent {
        let mut event = LogEvent::new(id, LogLevel::Information, "Hello {Name}")
            .with_args(vec!["world".into()]);
        event.set_property("ProcessId", 4242u32);
        event.set_property("Version", "1.0.0");
        event
    }

    #[test]
    fn test_auto_create_and_round_trip() {
        let store = MemoryTableStore::new();
        let mut writer = TableWriter::new(store.clone(), sample_options()).unwrap();

        writer.write(&sample_event(1)).unwrap();

        let table = store.table("Logs").unwrap();
        assert!(table.schema.column("MessageTemplate").is_none());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(store.column_values("Logs", "ProcessId"), vec![PropertyValue::Int(4242)]);
        assert_eq!(store.column_values("Logs", "Version"), vec![PropertyValue::from("1.0.0")]);
        assert_eq!(store.column_values("Logs", "Message"), vec![PropertyValue::from("Hello world")]);
        assert_eq!(store.column_values("Logs", "Level"), vec![PropertyValue::from("Information")]);
        assert_eq!(store.column_values("Logs", "Exception"), vec![PropertyValue::Null]);

        let props = store.column_values("Logs", "Properties");
        let PropertyValue::String(json) = &props[0] else {
            panic!("properties column should hold JSON text");
        };
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["Name"], "world");
    }

    #[test]
    fn test_missing_table_without_auto_create() {
        let store = MemoryTableStore::new();
        let mut writer =
            TableWriter::new(store.clone(), sample_options().auto_create_table(false)).unwrap();

        let err = writer.write(&sample_event(1)).unwrap_err();
        assert!(matches!(err, RouterError::SchemaMismatch { .. }));
        assert!(store.table("Logs").is_none());
    }

    #[test]
    fn test_incompatible_existing_table() {
        let options = sample_options();
        let mut existing = options.column_options.schema("Logs");
        existing.columns.retain(|c| c.name != "Version");

        let store = MemoryTableStore::with_table(existing);
        let mut writer = TableWriter::new(store.clone(), options).unwrap();

        let err = writer.write(&sample_event(1)).unwrap_err();
        assert!(err.to_string().contains("Version"));
        assert!(store.rows("Logs").is_empty());
    }

    #[test]
    fn test_rows_are_batched_until_flush() {
        let store = MemoryTableStore::new();
        let mut writer = TableWriter::new(store.clone(), sample_options().batch_size(3)).unwrap();

        writer.write(&sample_event(1)).unwrap();
        writer.write(&sample_event(2)).unwrap();
        assert_eq!(writer.buffered(), 2);
        assert!(store.rows("Logs").is_empty());

        writer.write(&sample_event(3)).unwrap();
        assert_eq!(store.rows("Logs").len(), 3);

        writer.write(&sample_event(4)).unwrap();
        writer.flush().unwrap();
        assert_eq!(store.rows("Logs").len(), 4);
        assert_eq!(store.insert_batches(), 2);
    }

    #[test]
    fn test_failed_batch_is_discarded() {
        let store = MemoryTableStore::new();
        let mut writer = TableWriter::new(store.clone(), sample_options().batch_size(2)).unwrap();

        writer.write(&sample_event(1)).unwrap();
        store.fail_inserts(Some("connection reset"));
        assert!(writer.write(&sample_event(2)).is_err());
        assert_eq!(writer.buffered(), 0);

        store.fail_inserts(None);
        writer.write(&sample_event(3)).unwrap();
        writer.flush().unwrap();
        assert_eq!(store.rows("Logs").len(), 1);
    }

    #[test]
    fn test_uncoercible_value_stored_as_null() {
        let store = MemoryTableStore::new();
        let mut writer = TableWriter::new(store.clone(), sample_options()).unwrap();

        let mut event = sample_event(1);
        event.set_property("ProcessId", "not-a-number");
        writer.write(&event).unwrap();

        assert_eq!(store.column_values("Logs", "ProcessId"), vec![PropertyValue::Null]);
    }

    #[test]
    fn test_close_flushes_and_releases_store() {
        let store = MemoryTableStore::new();
        let mut writer = TableWriter::new(store.clone(), sample_options().batch_size(10)).unwrap();

        writer.write(&sample_event(1)).unwrap();
        writer.close().unwrap();

        assert_eq!(store.rows("Logs").len(), 1);
        assert!(store.is_closed());
        assert!(writer.write(&sample_event(2)).is_err());
        assert!(writer.close().is_ok());
    }

    #[test]
    fn test_invalid_options_rejected_at_construction() {
        let bad_table = TableWriterOptions::new("Logs; DROP TABLE Logs");
        assert!(TableWriter::new(MemoryTableStore::new(), bad_table).is_err());

        let zero_batch = TableWriterOptions::new("Logs").batch_size(0);
        assert!(TableWriter::new(MemoryTableStore::new(), zero_batch).is_err());
    }
}
