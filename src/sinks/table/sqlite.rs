//! SQLite table store backed by sqlx
//!
//! sqlx is async; the store owns a current-thread tokio runtime and blocks on
//! it, since sink writers are called synchronously from dispatch.

use super::columns::{ColumnSchema, ColumnType, TableSchema};
use super::store::{Row, TableStore};
use crate::core::{PropertyValue, Result, RouterError};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqlitePoolOptions};
use sqlx::{migrate::MigrateDatabase, query, Row as _};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Runtime;

pub struct SqliteTableStore {
    runtime: Runtime,
    pool: Option<SqlitePool>,
}

impl SqliteTableStore {
    /// Connect to `url` (e.g. `sqlite://logs.db` or `sqlite::memory:`),
    /// creating the database file when missing
    pub fn connect(url: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let pool = runtime
            .block_on(async {
                if !Sqlite::database_exists(url).await? {
                    Sqlite::create_database(url).await?;
                }
                // A single long-lived connection keeps in-memory databases alive
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>)
                    .connect(url)
                    .await
            })
            .map_err(|e| store_error("connect", e))?;

        Ok(Self {
            runtime,
            pool: Some(pool),
        })
    }

    /// Run `future` on the store's runtime
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .as_ref()
            .ok_or_else(|| RouterError::store("connect", "store is closed"))
    }
}

fn store_error(operation: &str, error: sqlx::Error) -> RouterError {
    RouterError::store(operation, error.to_string())
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Declared SQLite type; unbounded text is plain `TEXT`
fn sqlite_type(column: &ColumnSchema) -> String {
    match (column.data_type, column.data_length) {
        (ColumnType::NVarChar, None) => "TEXT".to_string(),
        (data_type, data_length) => data_type.sql_type(data_length),
    }
}

fn column_sql(column: &ColumnSchema) -> String {
    let null = if column.nullable { "NULL" } else { "NOT NULL" };
    format!("{} {} {}", quote(&column.name), sqlite_type(column), null)
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &PropertyValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        PropertyValue::Null => query.bind(None::<String>),
        PropertyValue::Bool(b) => query.bind(*b),
        PropertyValue::Int(i) => query.bind(*i),
        PropertyValue::Float(f) => query.bind(*f),
        PropertyValue::String(s) => query.bind(s.clone()),
        PropertyValue::Timestamp(ts) => query.bind(ts.to_rfc3339()),
    }
}

impl TableStore for SqliteTableStore {
    fn table_schema(&mut self, table: &str) -> Result<Option<TableSchema>> {
        let pool = self.pool()?;
        let sql = format!("PRAGMA table_info({})", quote(table));
        let rows = self
            .runtime
            .block_on(query(&sql).fetch_all(pool))
            .map_err(|e| store_error("read schema", e))?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name").map_err(|e| store_error("read schema", e))?;
            let declared: String = row.try_get("type").map_err(|e| store_error("read schema", e))?;
            let not_null: i64 = row.try_get("notnull").map_err(|e| store_error("read schema", e))?;
            columns.push(ColumnSchema {
                name,
                // SQLite accepts any declared type; treat unknown ones as text
                data_type: ColumnType::from_sql_type(&declared).unwrap_or(ColumnType::NVarChar),
                data_length: None,
                nullable: not_null == 0,
            });
        }

        Ok(Some(TableSchema {
            name: table.to_string(),
            columns,
        }))
    }

    fn create_table(&mut self, schema: &TableSchema) -> Result<()> {
        let pool = self.pool()?;
        let mut definitions = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote("Id"))];
        definitions.extend(schema.columns.iter().map(column_sql));

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(&schema.name),
            definitions.join(", ")
        );
        self.runtime
            .block_on(query(&sql).execute(pool))
            .map_err(|e| store_error("create table", e))?;
        Ok(())
    }

    fn insert_rows(&mut self, schema: &TableSchema, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let pool = self.pool()?;

        let names: Vec<String> = schema.columns.iter().map(|c| quote(&c.name)).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&schema.name),
            names.join(", "),
            placeholders
        );

        self.runtime
            .block_on(async {
                let mut tx = pool.begin().await?;
                for row in rows {
                    row.iter()
                        .fold(query(&sql), bind_value)
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await
            })
            .map_err(|e| store_error("insert", e))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            self.runtime.block_on(pool.close());
        }
        Ok(())
    }
}

impl Drop for SqliteTableStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
