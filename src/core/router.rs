//! Router: the entry point applications log through

use super::{
    context::{ContextGuard, RouterContext},
    dispatch::{
        default_error_handler, in_error_handler, ErrorHandler, PendingReply, QueueOptions,
        SinkPipeline,
    },
    enrichment::{EnrichmentRule, EnrichmentStage},
    error::{Result, RouterError},
    filter::SinkFilter,
    flush::FlushReport,
    log_event::LogEvent,
    log_level::LogLevel,
    metrics::{RouterMetrics, SinkMetrics},
    overflow_policy::{OverflowCallback, OverflowPolicy},
    property::{Properties, PropertyValue},
    sink::SinkWriter,
    template::MessageTemplate,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default shutdown timeout used when a router is dropped without `close()`
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouterState {
    Active,
    Closed,
}

/// Fans each event out to every configured sink
///
/// Owned by the application's composition root and shared by `Arc`; there is
/// no global instance.
pub struct Router {
    minimum_level: LogLevel,
    enrichment: EnrichmentStage,
    context: RouterContext,
    sinks: Vec<SinkPipeline>,
    state: RwLock<RouterState>,
    next_event_id: AtomicU64,
    metrics: RouterMetrics,
    on_error: ErrorHandler,
}

impl Router {
    /// Create a builder for Router
    ///
    /// # Example
    /// ```
    /// use rust_log_router::prelude::*;
    ///
    /// let router = Router::builder()
    ///     .minimum_level(LogLevel::Debug)
    ///     .sink(ConsoleWriter::new(), LogLevel::Debug)
    ///     .build();
    /// ```
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Emit an event
    ///
    /// `args` bind to the template's holes in order. Each sink writes on its
    /// own worker unless the router was built
    /// [`synchronous`](RouterBuilder::synchronous). Fails only with
    /// [`RouterError::Closed`]; sink failures go to the error handler.
    pub fn emit(
        &self,
        level: LogLevel,
        template: impl Into<MessageTemplate>,
        args: Vec<PropertyValue>,
        properties: Properties,
    ) -> Result<()> {
        self.route(level, |event_id| {
            LogEvent::new(event_id, level, template)
                .with_args(args)
                .with_properties(properties)
        })
    }

    /// Emit an event carrying exception text
    pub fn emit_with_exception(
        &self,
        level: LogLevel,
        exception: &(dyn std::error::Error + 'static),
        template: impl Into<MessageTemplate>,
        args: Vec<PropertyValue>,
    ) -> Result<()> {
        self.route(level, |event_id| {
            LogEvent::new(event_id, level, template)
                .with_args(args)
                .with_exception(describe_error(exception))
        })
    }

    fn route(&self, level: LogLevel, build: impl FnOnce(u64) -> LogEvent) -> Result<()> {
        // Recursive read: an error handler may log through the same router
        let state = self.state.read_recursive();
        if *state == RouterState::Closed {
            self.metrics.record_rejected_after_close();
            return Err(RouterError::Closed);
        }

        if level < self.minimum_level {
            self.metrics.record_below_minimum();
            return Ok(());
        }

        let mut event = build(self.next_event_id.fetch_add(1, Ordering::Relaxed));
        if in_error_handler() {
            event.mark_from_error_handler();
        }
        let failures = self.enrichment.enrich(&mut event);
        if failures > 0 {
            self.metrics.record_enrichment_failures(failures);
        }
        self.metrics.record_emitted();

        let event = Arc::new(event);
        for sink in &self.sinks {
            sink.submit(&event, &self.on_error);
        }
        Ok(())
    }

    #[inline]
    pub fn log(&self, level: LogLevel, template: impl Into<MessageTemplate>) -> Result<()> {
        self.emit(level, template, Vec::new(), Properties::new())
    }

    #[inline]
    pub fn trace(&self, template: impl Into<MessageTemplate>) -> Result<()> {
        self.log(LogLevel::Trace, template)
    }

    #[inline]
    pub fn debug(&self, template: impl Into<MessageTemplate>) -> Result<()> {
        self.log(LogLevel::Debug, template)
    }

    #[inline]
    pub fn info(&self, template: impl Into<MessageTemplate>) -> Result<()> {
        self.log(LogLevel::Information, template)
    }

    #[inline]
    pub fn warn(&self, template: impl Into<MessageTemplate>) -> Result<()> {
        self.log(LogLevel::Warning, template)
    }

    #[inline]
    pub fn error(&self, template: impl Into<MessageTemplate>) -> Result<()> {
        self.log(LogLevel::Error, template)
    }

    #[inline]
    pub fn fatal(&self, template: impl Into<MessageTemplate>) -> Result<()> {
        self.log(LogLevel::Fatal, template)
    }

    /// Fatal event with the error chain as exception text
    pub fn fatal_with_exception(
        &self,
        exception: &(dyn std::error::Error + 'static),
        template: impl Into<MessageTemplate>,
    ) -> Result<()> {
        self.emit_with_exception(LogLevel::Fatal, exception, template, Vec::new())
    }

    /// Set a context property until the guard drops
    ///
    /// Only visible in events when the router was built with
    /// [`RouterBuilder::enrich_from_context`].
    #[must_use = "the property is removed as soon as the guard is dropped"]
    pub fn push_property<K, V>(&self, key: K, value: V) -> ContextGuard
    where
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        self.context.push(key, value)
    }

    pub fn context(&self) -> &RouterContext {
        &self.context
    }

    pub fn minimum_level(&self) -> LogLevel {
        self.minimum_level
    }

    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    pub fn sink_names(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(SinkPipeline::name)
    }

    pub fn sink_metrics(&self, sink: &str) -> Option<&SinkMetrics> {
        self.find_sink(sink).map(SinkPipeline::metrics)
    }

    pub fn sink_threshold(&self, sink: &str) -> Option<LogLevel> {
        self.find_sink(sink).map(|s| s.filter().threshold())
    }

    fn find_sink(&self, sink: &str) -> Option<&SinkPipeline> {
        self.sinks.iter().find(|s| s.name() == sink)
    }

    pub fn is_closed(&self) -> bool {
        *self.state.read() == RouterState::Closed
    }

    /// Block until every queued event is written, then flush every writer
    ///
    /// Flush errors are collected per sink in the report. With a timeout, a
    /// missed deadline returns [`RouterError::FlushTimeout`] listing the
    /// unflushed count of every sink.
    pub fn flush(&self, timeout: Option<Duration>) -> Result<FlushReport> {
        let state = self.state.read_recursive();
        if *state == RouterState::Closed {
            self.metrics.record_rejected_after_close();
            return Err(RouterError::Closed);
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let replies: Vec<_> = self.sinks.iter().map(|s| s.begin_flush(deadline)).collect();
        self.collect(replies, deadline)
    }

    /// Flush, close every writer, and reject all further `emit`/`flush` calls
    ///
    /// Closing an already closed router is a no-op returning an empty report.
    pub fn close(&self, timeout: Option<Duration>) -> Result<FlushReport> {
        {
            let mut state = self.state.write();
            if *state == RouterState::Closed {
                return Ok(FlushReport::default());
            }
            *state = RouterState::Closed;
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let replies: Vec<_> = self.sinks.iter().map(|s| s.begin_close(deadline)).collect();
        let report = self.collect(replies, deadline);
        for sink in &self.sinks {
            sink.await_worker(deadline);
        }
        report
    }

    fn collect(&self, replies: Vec<PendingReply>, deadline: Option<Instant>) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        let mut timed_out = false;

        for (sink, reply) in self.sinks.iter().zip(replies) {
            match sink.finish(reply, deadline) {
                PendingReply::Ready(error) => report.sinks.push(sink.status(error)),
                _ => timed_out = true,
            }
        }

        if timed_out {
            return Err(RouterError::flush_timeout(
                self.sinks.iter().map(SinkPipeline::pending).collect(),
            ));
        }
        Ok(report)
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        match self.close(Some(DEFAULT_SHUTDOWN_TIMEOUT)) {
            Ok(report) => {
                for (sink, error) in report.errors() {
                    eprintln!("[LOGGER ERROR] Sink '{}' failed during shutdown: {}", sink, error);
                }
            }
            Err(e) => eprintln!("[LOGGER WARNING] {}. Some events may be lost.", e),
        }

        for sink in &self.sinks {
            let dropped = sink.metrics().dropped();
            if dropped > 0 {
                eprintln!(
                    "[LOGGER WARNING] Sink '{}' shut down with {} dropped events",
                    sink.name(),
                    dropped
                );
            }
        }
    }
}

/// Render an error and its source chain, one cause per line
fn describe_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str("\n  caused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

struct PendingSink {
    writer: Box<dyn SinkWriter>,
    threshold: LogLevel,
    queue: Option<QueueOptions>,
}

/// Builder for constructing a Router with a fluent API
///
/// # Example
/// ```
/// use rust_log_router::prelude::*;
/// use std::sync::Arc;
///
/// let router = Router::builder()
///     .minimum_level(LogLevel::Trace)
///     .sink(ConsoleWriter::new(), LogLevel::Debug)
///     .async_mode(1000)
///     .overflow_policy(OverflowPolicy::AlertAndDrop)
///     .on_overflow(Arc::new(|sink: &str, count: u64| {
///         eprintln!("ALERT: {} dropped {} events", sink, count);
///     }))
///     .enrich(EnrichmentRule::process_id())
///     .build();
/// ```
pub struct RouterBuilder {
    minimum_level: LogLevel,
    sinks: Vec<PendingSink>,
    enrichment: EnrichmentStage,
    context: RouterContext,
    queue: Option<QueueOptions>,
    synchronous: bool,
    on_error: ErrorHandler,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            minimum_level: LogLevel::Trace,
            sinks: Vec::new(),
            enrichment: EnrichmentStage::new(),
            context: RouterContext::new(),
            queue: None,
            synchronous: false,
            on_error: default_error_handler(),
        }
    }

    /// Events below this level are discarded before enrichment
    #[must_use = "builder methods return a new value"]
    pub fn minimum_level(mut self, level: LogLevel) -> Self {
        self.minimum_level = level;
        self
    }

    /// Add a sink with its own minimum level
    #[must_use = "builder methods return a new value"]
    pub fn sink<W: SinkWriter + 'static>(self, writer: W, threshold: LogLevel) -> Self {
        self.boxed_sink(Box::new(writer), threshold)
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_sink(mut self, writer: Box<dyn SinkWriter>, threshold: LogLevel) -> Self {
        self.sinks.push(PendingSink {
            writer,
            threshold,
            queue: None,
        });
        self
    }

    /// Add a sink with its own queue settings, regardless of `async_mode`
    #[must_use = "builder methods return a new value"]
    pub fn queued_sink(
        mut self,
        writer: Box<dyn SinkWriter>,
        threshold: LogLevel,
        queue: QueueOptions,
    ) -> Self {
        self.sinks.push(PendingSink {
            writer,
            threshold,
            queue: Some(queue),
        });
        self
    }

    /// Capacity of each sink's queue; defaults to [`DEFAULT_QUEUE_CAPACITY`]
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self, capacity: usize) -> Self {
        let queue = self.queue.take().map_or_else(
            || QueueOptions::new(capacity),
            |q| QueueOptions { capacity, ..q },
        );
        self.queue = Some(queue);
        self
    }

    /// Overflow policy for queued sinks
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.queue_options().overflow_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.queue_options().on_overflow = Some(callback);
        self
    }

    /// How long a queued sink may sit idle with unflushed writes
    #[must_use = "builder methods return a new value"]
    pub fn idle_flush(mut self, interval: Option<Duration>) -> Self {
        self.queue_options().idle_flush = interval;
        self
    }

    /// Write sinks on the emitting thread instead of through a queue
    ///
    /// `emit` then returns only after every admitting sink has written the
    /// event. Sinks added with [`queued_sink`](Self::queued_sink) stay queued.
    #[must_use = "builder methods return a new value"]
    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }

    fn queue_options(&mut self) -> &mut QueueOptions {
        self.queue
            .get_or_insert_with(|| QueueOptions::new(DEFAULT_QUEUE_CAPACITY))
    }

    /// Fallback channel for write failures; defaults to stderr
    #[must_use = "builder methods return a new value"]
    pub fn on_error(mut self, handler: ErrorHandler) -> Self {
        self.on_error = handler;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn enrich(mut self, rule: EnrichmentRule) -> Self {
        self.enrichment.push(rule);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn enrich_with_property(
        self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.enrich(EnrichmentRule::with_property(key, value))
    }

    /// Copy the router's scoped context into every event
    #[must_use = "builder methods return a new value"]
    pub fn enrich_from_context(self) -> Self {
        let context = self.context.clone();
        self.enrich(EnrichmentRule::FromContext(context))
    }

    pub fn build(self) -> Router {
        let shared_queue = if self.synchronous {
            None
        } else {
            Some(
                self.queue
                    .unwrap_or_else(|| QueueOptions::new(DEFAULT_QUEUE_CAPACITY)),
            )
        };
        let mut names: Vec<String> = Vec::with_capacity(self.sinks.len());
        let mut sinks = Vec::with_capacity(self.sinks.len());

        for pending in self.sinks {
            let name = unique_name(pending.writer.name(), &names);
            names.push(name.clone());
            let filter = SinkFilter::new(pending.threshold);

            let pipeline = match pending.queue.or_else(|| shared_queue.clone()) {
                Some(queue) => SinkPipeline::queued(
                    name,
                    filter,
                    pending.writer,
                    queue,
                    Arc::clone(&self.on_error),
                ),
                None => SinkPipeline::direct(name, filter, pending.writer),
            };
            sinks.push(pipeline);
        }

        Router {
            minimum_level: self.minimum_level,
            enrichment: self.enrichment,
            context: self.context,
            sinks,
            state: RwLock::new(RouterState::Active),
            next_event_id: AtomicU64::new(1),
            metrics: RouterMetrics::new(),
            on_error: self.on_error,
        }
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue capacity used when `async_mode` is not called
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

fn unique_name(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|n| n == base) {
        return base.to_string();
    }
    (2..)
        .map(|i| format!("{}-{}", base, i))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}
