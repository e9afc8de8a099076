//! Error types for the log router

use super::log_event::LogEvent;
use std::fmt;

pub type Result<T> = std::result::Result<T, RouterError>;

/// Unflushed event count for one sink, reported by [`RouterError::FlushTimeout`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkPending {
    pub sink: String,
    pub pending: u64,
}

impl fmt::Display for SinkPending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.sink, self.pending)
    }
}

fn format_pending(pending: &[SinkPending]) -> String {
    pending
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Router was closed; no further emit or flush is accepted
    #[error("Router is closed")]
    Closed,

    /// Flush deadline passed before every sink drained
    #[error("Flush timed out with unflushed events: {}", format_pending(.pending))]
    FlushTimeout { pending: Vec<SinkPending> },

    /// A sink failed to persist an event. Never crosses sink boundaries.
    #[error("Sink '{sink}' failed to write event: {source}")]
    WriteFailure {
        sink: String,
        event: Box<LogEvent>,
        #[source]
        source: Box<RouterError>,
    },

    /// Table store (database client) error
    #[error("Table store error while {operation}: {message}")]
    Store { operation: String, message: String },

    /// Existing table does not have the columns the writer needs
    #[error("Schema mismatch for table '{table}': {message}")]
    SchemaMismatch { table: String, message: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Queue full with buffer details
    #[error("Log queue full for sink '{sink}': {capacity} messages buffered")]
    QueueFull { sink: String, capacity: usize },

    /// A writer panicked; the panic was contained
    #[error("Writer '{sink}' panicked: {message}")]
    WriterPanicked { sink: String, message: String },

    /// Generic writer error
    #[error("Writer error: {0}")]
    Writer(String),
}

impl RouterError {
    /// Create a flush timeout error
    pub fn flush_timeout(pending: Vec<SinkPending>) -> Self {
        RouterError::FlushTimeout { pending }
    }

    /// Wrap a writer error together with the event it failed on
    pub fn write_failure(sink: impl Into<String>, event: LogEvent, source: RouterError) -> Self {
        RouterError::WriteFailure {
            sink: sink.into(),
            event: Box::new(event),
            source: Box::new(source),
        }
    }

    /// Create a table store error
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        RouterError::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(table: impl Into<String>, message: impl Into<String>) -> Self {
        RouterError::SchemaMismatch {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        RouterError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a queue full error
    pub fn queue_full(sink: impl Into<String>, capacity: usize) -> Self {
        RouterError::QueueFull {
            sink: sink.into(),
            capacity,
        }
    }

    /// Create a writer panic error
    pub fn writer_panicked(sink: impl Into<String>, message: impl Into<String>) -> Self {
        RouterError::WriterPanicked {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        RouterError::Writer(msg.into())
    }

    /// Name of the sink this error belongs to, if any
    pub fn sink(&self) -> Option<&str> {
        match self {
            RouterError::WriteFailure { sink, .. }
            | RouterError::QueueFull { sink, .. }
            | RouterError::WriterPanicked { sink, .. } => Some(sink),
            _ => None,
        }
    }
}
