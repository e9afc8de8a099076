//! In-process table store
//!
//! Clones share the same tables, so a test can hand one clone to the router
//! and inspect rows through another.

use super::columns::TableSchema;
use super::store::{Row, TableStore};
use crate::core::{PropertyValue, Result, RouterError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    pub schema: TableSchema,
    pub rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct Database {
    tables: HashMap<String, MemoryTable>,
    failing_inserts: Option<String>,
    insert_batches: usize,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTableStore {
    db: Arc<Mutex<Database>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already contains `schema` with no rows
    pub fn with_table(schema: TableSchema) -> Self {
        let store = Self::new();
        store.db.lock().tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema,
                rows: Vec::new(),
            },
        );
        store
    }

    pub fn table(&self, name: &str) -> Option<MemoryTable> {
        self.db.lock().tables.get(name).cloned()
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.table(table).map(|t| t.rows).unwrap_or_default()
    }

    /// Every value stored in `column` of `table`, in insertion order
    pub fn column_values(&self, table: &str, column: &str) -> Vec<PropertyValue> {
        let db = self.db.lock();
        let Some(t) = db.tables.get(table) else {
            return Vec::new();
        };
        let Some(index) = t.schema.column_index(column) else {
            return Vec::new();
        };
        t.rows.iter().map(|row| row[index].clone()).collect()
    }

    /// Make every following insert fail with `message` (`None` to recover)
    pub fn fail_inserts(&self, message: Option<&str>) {
        self.db.lock().failing_inserts = message.map(str::to_string);
    }

    /// Number of successful insert batches
    pub fn insert_batches(&self) -> usize {
        self.db.lock().insert_batches
    }

    pub fn is_closed(&self) -> bool {
        self.db.lock().closed
    }
}

impl TableStore for MemoryTableStore {
    fn table_schema(&mut self, table: &str) -> Result<Option<TableSchema>> {
        Ok(self.db.lock().tables.get(table).map(|t| t.schema.clone()))
    }

    fn create_table(&mut self, schema: &TableSchema) -> Result<()> {
        self.db
            .lock()
            .tables
            .entry(schema.name.clone())
            .or_insert_with(|| MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
            });
        Ok(())
    }

    fn insert_rows(&mut self, schema: &TableSchema, rows: &[Row]) -> Result<()> {
        let mut db = self.db.lock();
        if let Some(message) = &db.failing_inserts {
            return Err(RouterError::store("insert", message.clone()));
        }

        let table = db.tables.get_mut(&schema.name).ok_or_else(|| {
            RouterError::store("insert", format!("no such table: {}", schema.name))
        })?;

        // Map the caller's column order onto the stored layout
        let mut mapped = Vec::with_capacity(rows.len());
        for row in rows {
            let mut stored = vec![PropertyValue::Null; table.schema.columns.len()];
            for (column, value) in schema.columns.iter().zip(row) {
                let index = table.schema.column_index(&column.name).ok_or_else(|| {
                    RouterError::store("insert", format!("no such column: {}", column.name))
                })?;
                stored[index] = value.clone();
            }
            mapped.push(stored);
        }

        table.rows.extend(mapped);
        db.insert_batches += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.db.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::table::ColumnOptions;

    #[test]
    fn test_insert_is_all_or_nothing() {
        let schema = ColumnOptions::default().schema("Logs");
        let mut store = MemoryTableStore::new();
        store.create_table(&schema).unwrap();

        let row = vec![PropertyValue::Null; schema.columns.len()];
        store.insert_rows(&schema, &[row.clone(), row.clone()]).unwrap();

        store.fail_inserts(Some("disk full"));
        let err = store.insert_rows(&schema, &[row.clone()]).unwrap_err();
        assert!(err.to_string().contains("disk full"));

        store.fail_inserts(None);
        assert_eq!(store.rows("Logs").len(), 2);
        assert_eq!(store.insert_batches(), 1);
    }

    #[test]
    fn test_missing_table_is_store_error() {
        let schema = ColumnOptions::default().schema("Nowhere");
        let mut store = MemoryTableStore::new();
        assert!(matches!(
            store.insert_rows(&schema, &[]),
            Err(RouterError::Store { .. })
        ));
        assert!(store.table_schema("Nowhere").unwrap().is_none());
    }
}
