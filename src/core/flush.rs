//! Flush and close outcomes

use serde::Serialize;

/// Outcome of flushing one sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkFlushStatus {
    pub sink: String,
    /// Events still queued when the flush returned; zero on success
    pub pending: u64,
    /// Events the writer has accepted over the router's lifetime
    pub written: u64,
    /// Events the writer rejected over the router's lifetime
    pub failed: u64,
    /// Flush or close error reported by the writer, if any
    pub error: Option<String>,
}

/// Per-sink result of `Router::flush` or `Router::close`
///
/// Individual sink failures are collected here rather than aborting the flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub sinks: Vec<SinkFlushStatus>,
}

impl FlushReport {
    /// `true` when no sink reported a flush error
    pub fn is_clean(&self) -> bool {
        self.sinks.iter().all(|s| s.error.is_none())
    }

    pub fn total_pending(&self) -> u64 {
        self.sinks.iter().map(|s| s.pending).sum()
    }

    pub fn get(&self, sink: &str) -> Option<&SinkFlushStatus> {
        self.sinks.iter().find(|s| s.sink == sink)
    }

    /// `(sink, error)` pairs for every sink that failed to flush
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sinks
            .iter()
            .filter_map(|s| s.error.as_deref().map(|e| (s.sink.as_str(), e)))
    }
}
