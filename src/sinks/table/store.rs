//! Storage backend seam for table sinks

use super::columns::TableSchema;
use crate::core::{PropertyValue, Result};

/// One row of values, positionally aligned with the table schema's columns
pub type Row = Vec<PropertyValue>;

/// A relational store a [`TableWriter`](super::TableWriter) persists rows into
///
/// Calls are made from a single thread at a time; implementations are free to
/// block.
pub trait TableStore: Send {
    /// Current schema of `table`, or `None` when it does not exist
    fn table_schema(&mut self, table: &str) -> Result<Option<TableSchema>>;

    fn create_table(&mut self, schema: &TableSchema) -> Result<()>;

    /// Insert `rows` atomically: either all are stored or none
    fn insert_rows(&mut self, schema: &TableSchema, rows: &[Row]) -> Result<()>;

    /// Release connections; later calls may fail
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: TableStore + ?Sized> TableStore for Box<S> {
    fn table_schema(&mut self, table: &str) -> Result<Option<TableSchema>> {
        (**self).table_schema(table)
    }

    fn create_table(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).create_table(schema)
    }

    fn insert_rows(&mut self, schema: &TableSchema, rows: &[Row]) -> Result<()> {
        (**self).insert_rows(schema, rows)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
