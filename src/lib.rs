//! # Rust Log Router
//!
//! Routes structured log events to several sinks at once, each with its own
//! minimum severity.
//!
//! ## Features
//!
//! - **Per-sink thresholds**: a console can show everything while a database
//!   table only keeps `Information` and above
//! - **Enrichment**: process id, version, scoped context and custom properties
//!   are attached once per event, before any sink sees it
//! - **Failure isolation**: one sink failing or panicking never stops the others
//! - **Bounded queues**: each sink writes on its own worker thread, with
//!   overflow policies; `synchronous()` writes on the emitting thread instead
//! - **Table sink**: column mapping with auto-created tables, in memory or on
//!   SQLite (`sqlite` feature)
//!
//! ## Example
//!
//! ```
//! use rust_log_router::prelude::*;
//! use rust_log_router::sinks::table::{ColumnDefinition, ColumnOptions, ColumnType, MemoryTableStore};
//!
//! # fn main() -> rust_log_router::Result<()> {
//! let store = MemoryTableStore::new();
//! let table = TableWriter::new(
//!     store.clone(),
//!     TableWriterOptions::new("Logs")
//!         .auto_create_table(true)
//!         .column_options(ColumnOptions::default().with_column(
//!             ColumnDefinition::new("ProcessId").with_type(ColumnType::BigInt),
//!         )),
//! )?;
//!
//! let router = Router::builder()
//!     .sink(ConsoleWriter::new(), LogLevel::Debug)
//!     .sink(table, LogLevel::Information)
//!     .enrich(EnrichmentRule::process_id())
//!     .build();
//!
//! router.info("Stored in the table and shown on the console")?;
//! router.debug("Shown on the console only")?;
//! router.close(None)?;
//!
//! assert_eq!(store.rows("Logs").len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::config::{DefaultStores, RouterConfig, SinkConfig, StoreFactory};
    pub use crate::core::{
        ContextGuard, EnrichmentRule, ErrorHandler, FlushReport, LogEvent, LogLevel,
        MessageTemplate, OutputFormat, OverflowCallback, OverflowPolicy, Properties,
        PropertyValue, QueueOptions, Result, Router, RouterBuilder, RouterContext, RouterError,
        SinkFilter, SinkWriter, TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{ConsoleWriter, FileWriter, TableWriter, TableWriterOptions};
}

pub use config::{DefaultStores, RouterConfig, SinkConfig, StoreFactory};
pub use core::{
    admit, ContextGuard, EnrichmentRule, ErrorHandler, FlushReport, LogEvent, LogLevel,
    LogPriority, MessageTemplate, OutputFormat, OverflowCallback, OverflowPolicy, Properties,
    PropertyValue, QueueOptions, Result, Router, RouterBuilder, RouterContext, RouterError,
    RouterMetrics, SinkFilter, SinkFlushStatus, SinkMetrics, SinkWriter, TimestampFormat,
    DEFAULT_SHUTDOWN_TIMEOUT, UNAVAILABLE,
};
pub use sinks::{ConsoleWriter, FileWriter, TableWriter, TableWriterOptions};
