//! Router and sink metrics for observability
//!
//! Provides lock-free counters for monitoring router health, including
//! per-sink write failures, queue overflow events, and pending events.

use std::sync::atomic::{AtomicU64, Ordering};

/// Router-wide counters
///
/// # Example
///
/// ```
/// use rust_log_router::RouterMetrics;
///
/// let metrics = RouterMetrics::new();
/// metrics.record_emitted();
/// metrics.record_enrichment_failures(2);
///
/// assert_eq!(metrics.emitted(), 1);
/// assert_eq!(metrics.enrichment_failures(), 2);
/// ```
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Events that passed the global minimum level and were routed
    emitted: AtomicU64,

    /// Events below the global minimum level
    below_minimum: AtomicU64,

    /// Enrichment suppliers that failed and were replaced by the sentinel
    enrichment_failures: AtomicU64,

    /// Calls rejected because the router was closed
    rejected_after_close: AtomicU64,
}

impl RouterMetrics {
    pub const fn new() -> Self {
        Self {
            emitted: AtomicU64::new(0),
            below_minimum: AtomicU64::new(0),
            enrichment_failures: AtomicU64::new(0),
            rejected_after_close: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn below_minimum(&self) -> u64 {
        self.below_minimum.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn enrichment_failures(&self) -> u64 {
        self.enrichment_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected_after_close(&self) -> u64 {
        self.rejected_after_close.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_emitted(&self) -> u64 {
        self.emitted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_below_minimum(&self) -> u64 {
        self.below_minimum.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_enrichment_failures(&self, count: usize) -> u64 {
        self.enrichment_failures
            .fetch_add(count as u64, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected_after_close(&self) -> u64 {
        self.rejected_after_close.fetch_add(1, Ordering::Relaxed)
    }
}

/// Counters for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Events the writer accepted
    written: AtomicU64,

    /// Events the writer rejected with an error or panic
    failed: AtomicU64,

    /// Events dropped because the queue was full
    dropped: AtomicU64,

    /// Events below the sink threshold
    filtered: AtomicU64,

    /// Number of times the queue was found full
    queue_full_events: AtomicU64,

    /// Number of times an emit blocked waiting for queue space
    block_events: AtomicU64,

    /// Critical events that waited for space instead of being dropped
    critical_preserved: AtomicU64,

    /// Events queued but not yet processed by the worker
    pending: AtomicU64,
}

impl SinkMetrics {
    pub const fn new() -> Self {
        Self {
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            critical_preserved: AtomicU64::new(0),
            pending: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn critical_preserved(&self) -> u64 {
        self.critical_preserved.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn record_written(&self) -> u64 {
        self.written.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_critical_preserved(&self) -> u64 {
        self.critical_preserved.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn increment_pending(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn decrement_pending(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Failure rate as a percentage (0.0 - 100.0) of events that reached the writer
    pub fn failure_rate(&self) -> f64 {
        let failed = self.failed() as f64;
        let total = self.written() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_metrics_new() {
        let metrics = SinkMetrics::new();
        assert_eq!(metrics.written(), 0);
        assert_eq!(metrics.failed(), 0);
        assert_eq!(metrics.dropped(), 0);
        assert_eq!(metrics.pending(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = SinkMetrics::new();
        assert_eq!(metrics.record_dropped(), 0);
        assert_eq!(metrics.record_dropped(), 1);
        assert_eq!(metrics.dropped(), 2);
    }

    #[test]
    fn test_pending_tracking() {
        let metrics = SinkMetrics::new();
        metrics.increment_pending();
        metrics.increment_pending();
        metrics.decrement_pending();
        assert_eq!(metrics.pending(), 1);
    }

    #[test]
    fn test_failure_rate() {
        let metrics = SinkMetrics::new();
        assert_eq!(metrics.failure_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_written();
        }
        for _ in 0..10 {
            metrics.record_failed();
        }

        let rate = metrics.failure_rate();
        assert!((9.9..=10.1).contains(&rate), "Failure rate was {}", rate);
    }

    #[test]
    fn test_router_metrics() {
        let metrics = RouterMetrics::new();
        metrics.record_emitted();
        metrics.record_below_minimum();
        metrics.record_rejected_after_close();
        assert_eq!(metrics.emitted(), 1);
        assert_eq!(metrics.below_minimum(), 1);
        assert_eq!(metrics.rejected_after_close(), 1);
    }
}
