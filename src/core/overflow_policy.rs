//! Overflow policies for per-sink event queues
//!
//! When a sink's queue is full, these policies determine how
//! to handle new log events to prevent silent log loss.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for handling queue overflow on a queued sink
///
/// # Example
///
/// ```
/// use rust_log_router::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: alert and drop
/// let policy = OverflowPolicy::default();
///
/// // Block with timeout
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop new events when the queue is full
    ///
    /// Events are silently dropped but metrics are tracked.
    DropNewest,

    /// Block the emitting thread until space is available
    ///
    /// Warning: this applies backpressure to the application.
    Block,

    /// Block with timeout, then drop
    BlockWithTimeout(Duration),

    /// Drop but alert via callback and stderr
    #[default]
    AlertAndDrop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// Priority level for event preservation during overflow
///
/// Critical events are never dropped; they wait for queue space instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum LogPriority {
    /// Trace, Debug, Information
    #[default]
    Normal = 0,
    /// Warning
    High = 1,
    /// Error, Fatal
    Critical = 2,
}

impl fmt::Display for LogPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogPriority::Normal => write!(f, "Normal"),
            LogPriority::High => write!(f, "High"),
            LogPriority::Critical => write!(f, "Critical"),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called with the sink name and the total count of events that sink dropped so far.
pub type OverflowCallback = Arc<dyn Fn(&str, u64) + Send + Sync>;
