//! Per-sink dispatch: filter, writer ownership, queueing and isolation
//!
//! A sink is either *direct* (writer behind a mutex, written on the emitting
//! thread) or *queued* (bounded channel feeding a worker thread that owns the
//! writer). Every writer call is wrapped in `catch_unwind` so a failing or
//! panicking sink never affects the others.
//!
//! Failures go to the router's error handler only after the writer is
//! released. Errors raised while the handler runs, including failures of
//! events the handler itself logged, go straight to stderr.

use super::{
    error::{RouterError, SinkPending},
    filter::SinkFilter,
    flush::SinkFlushStatus,
    log_event::LogEvent,
    metrics::SinkMetrics,
    overflow_policy::{LogPriority, OverflowCallback, OverflowPolicy},
    sink::SinkWriter,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Fallback channel for errors that must not reach the caller
pub type ErrorHandler = Arc<dyn Fn(&RouterError) + Send + Sync>;

/// Default fallback: print to the process error stream
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|err| eprintln!("[LOGGER ERROR] {}", err))
}

thread_local! {
    static IN_ERROR_HANDLER: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is running the router's error handler
pub(crate) fn in_error_handler() -> bool {
    IN_ERROR_HANDLER.with(Cell::get)
}

/// Hand an error to the handler, or to stderr if the handler caused it
fn report_error(on_error: &ErrorHandler, error: RouterError, from_handler: bool) {
    if from_handler || in_error_handler() {
        eprintln!("[LOGGER ERROR] {}", error);
        return;
    }

    IN_ERROR_HANDLER.with(|flag| flag.set(true));
    let outcome = catch_unwind(AssertUnwindSafe(|| on_error(&error)));
    IN_ERROR_HANDLER.with(|flag| flag.set(false));

    if let Err(panic_info) = outcome {
        eprintln!(
            "[LOGGER ERROR] {} (error handler panicked: {})",
            error,
            panic_message(panic_info)
        );
    }
}

/// Queue settings for queued sinks
#[derive(Clone)]
pub struct QueueOptions {
    pub capacity: usize,
    pub overflow_policy: OverflowPolicy,
    pub on_overflow: Option<OverflowCallback>,
    /// Flush the writer after the queue has been idle this long
    pub idle_flush: Option<Duration>,
}

impl QueueOptions {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
            idle_flush: Some(DEFAULT_IDLE_FLUSH),
        }
    }
}

/// Idle period after which a queued sink flushes its writer
pub const DEFAULT_IDLE_FLUSH: Duration = Duration::from_millis(500);

type Reply = Option<String>;

enum SinkCommand {
    Write(Arc<LogEvent>),
    Flush(Sender<Reply>),
    Close(Sender<Reply>),
}

/// Handle for a flush or close request still being answered
pub(crate) enum PendingReply {
    Ready(Reply),
    Waiting(Receiver<Reply>),
    TimedOut,
}

pub(crate) struct SinkPipeline {
    name: String,
    filter: SinkFilter,
    metrics: Arc<SinkMetrics>,
    dispatch: Dispatch,
}

enum Dispatch {
    Direct(Mutex<Option<Box<dyn SinkWriter>>>),
    Queued(QueuedSink),
}

struct QueuedSink {
    sender: RwLock<Option<Sender<SinkCommand>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    options: QueueOptions,
}

impl SinkPipeline {
    pub(crate) fn direct(name: String, filter: SinkFilter, writer: Box<dyn SinkWriter>) -> Self {
        Self {
            name,
            filter,
            metrics: Arc::new(SinkMetrics::new()),
            dispatch: Dispatch::Direct(Mutex::new(Some(writer))),
        }
    }

    pub(crate) fn queued(
        name: String,
        filter: SinkFilter,
        writer: Box<dyn SinkWriter>,
        options: QueueOptions,
        on_error: ErrorHandler,
    ) -> Self {
        let (sender, receiver) = bounded(options.capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());
        let worker = Worker {
            name: name.clone(),
            writer,
            metrics: Arc::clone(&metrics),
            on_error,
            idle_flush: options.idle_flush,
            dirty: false,
        };

        let handle = thread::Builder::new()
            .name(format!("log-sink-{}", name))
            .spawn(move || worker.run(receiver));

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!(
                    "[LOGGER CRITICAL] Could not start worker for sink '{}': {}",
                    name, e
                );
                None
            }
        };

        Self {
            name,
            filter,
            metrics,
            dispatch: Dispatch::Queued(QueuedSink {
                sender: RwLock::new(handle.as_ref().map(|_| sender)),
                handle: Mutex::new(handle),
                options,
            }),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn filter(&self) -> SinkFilter {
        self.filter
    }

    pub(crate) fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    /// Filter and hand the event to the writer
    pub(crate) fn submit(&self, event: &Arc<LogEvent>, on_error: &ErrorHandler) {
        if !self.filter.admit(event) {
            self.metrics.record_filtered();
            return;
        }

        match &self.dispatch {
            Dispatch::Direct(writer) => {
                let failure = writer.lock().as_mut().and_then(|writer| {
                    write_isolated(writer.as_mut(), &self.name, event, &self.metrics)
                });
                if let Some(error) = failure {
                    report_error(on_error, error, event.from_error_handler());
                }
            }
            Dispatch::Queued(queue) => queue.enqueue(&self.name, Arc::clone(event), &self.metrics),
        }
    }

    /// Start a flush; direct sinks complete before returning
    pub(crate) fn begin_flush(&self, deadline: Option<Instant>) -> PendingReply {
        match &self.dispatch {
            Dispatch::Direct(writer) => {
                let guard = match deadline {
                    Some(deadline) => writer.try_lock_until(deadline),
                    None => Some(writer.lock()),
                };
                match guard {
                    Some(mut guard) => PendingReply::Ready(match guard.as_mut() {
                        Some(writer) => flush_isolated(writer.as_mut(), &self.name),
                        None => None,
                    }),
                    None => PendingReply::TimedOut,
                }
            }
            Dispatch::Queued(queue) => queue.request(SinkCommand::Flush, deadline),
        }
    }

    /// Start the final flush and close; afterwards the sink accepts nothing
    pub(crate) fn begin_close(&self, deadline: Option<Instant>) -> PendingReply {
        match &self.dispatch {
            Dispatch::Direct(writer) => PendingReply::Ready(match writer.lock().take() {
                Some(mut writer) => close_isolated(writer.as_mut(), &self.name),
                None => None,
            }),
            Dispatch::Queued(queue) => {
                let reply = queue.request(SinkCommand::Close, deadline);
                // No further commands; the worker exits after draining
                queue.sender.write().take();
                reply
            }
        }
    }

    /// Wait for a reply started by `begin_flush`/`begin_close`
    pub(crate) fn finish(&self, reply: PendingReply, deadline: Option<Instant>) -> PendingReply {
        match reply {
            PendingReply::Waiting(receiver) => {
                let outcome = match deadline {
                    Some(deadline) => receiver.recv_deadline(deadline),
                    None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };
                match outcome {
                    Ok(reply) => PendingReply::Ready(reply),
                    Err(RecvTimeoutError::Disconnected) => PendingReply::Ready(Some(format!(
                        "worker for sink '{}' exited before replying",
                        self.name
                    ))),
                    Err(RecvTimeoutError::Timeout) => PendingReply::TimedOut,
                }
            }
            other => other,
        }
    }

    /// Join the worker if it already finished
    pub(crate) fn join_worker(&self) {
        if let Dispatch::Queued(queue) = &self.dispatch {
            let mut handle = queue.handle.lock();
            if handle.as_ref().is_some_and(|h| h.is_finished()) {
                if let Some(handle) = handle.take() {
                    if let Err(e) = handle.join() {
                        eprintln!(
                            "[LOGGER ERROR] Worker for sink '{}' panicked during shutdown: {:?}",
                            self.name, e
                        );
                    }
                }
            } else if handle.is_some() {
                eprintln!(
                    "[LOGGER WARNING] Worker for sink '{}' did not finish in time. \
                     Some events may be lost.",
                    self.name
                );
            }
        }
    }

    /// Wait (bounded) for the worker thread to exit after close
    pub(crate) fn await_worker(&self, deadline: Option<Instant>) {
        if let Dispatch::Queued(queue) = &self.dispatch {
            loop {
                let finished = queue
                    .handle
                    .lock()
                    .as_ref()
                    .is_none_or(|h| h.is_finished());
                if finished || deadline.is_some_and(|d| Instant::now() >= d) {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        }
        self.join_worker();
    }

    pub(crate) fn status(&self, error: Option<String>) -> SinkFlushStatus {
        SinkFlushStatus {
            sink: self.name.clone(),
            pending: self.metrics.pending(),
            written: self.metrics.written(),
            failed: self.metrics.failed(),
            error,
        }
    }

    pub(crate) fn pending(&self) -> SinkPending {
        SinkPending {
            sink: self.name.clone(),
            pending: self.metrics.pending(),
        }
    }
}

impl QueuedSink {
    fn enqueue(&self, name: &str, event: Arc<LogEvent>, metrics: &SinkMetrics) {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return;
        };

        let priority = event.level.priority();
        metrics.increment_pending();

        match sender.try_send(SinkCommand::Write(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(command)) => {
                self.handle_overflow(name, sender, command, priority, metrics)
            }
            Err(TrySendError::Disconnected(_)) => metrics.decrement_pending(),
        }
    }

    /// Handle queue overflow based on configured policy and event priority
    fn handle_overflow(
        &self,
        name: &str,
        sender: &Sender<SinkCommand>,
        command: SinkCommand,
        priority: LogPriority,
        metrics: &SinkMetrics,
    ) {
        metrics.record_queue_full();

        // The handler may run on this sink's own worker; waiting would stall it
        if in_error_handler() {
            metrics.decrement_pending();
            metrics.record_dropped();
            return;
        }

        // Error and Fatal events are never dropped; wait for space instead
        if priority == LogPriority::Critical {
            metrics.record_critical_preserved();
            metrics.record_block();
            if sender.send(command).is_err() {
                metrics.decrement_pending();
            }
            return;
        }

        match &self.options.overflow_policy {
            OverflowPolicy::DropNewest => {
                metrics.decrement_pending();
                metrics.record_dropped();
            }
            OverflowPolicy::Block => {
                metrics.record_block();
                if sender.send(command).is_err() {
                    metrics.decrement_pending();
                }
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                metrics.record_block();
                match sender.send_timeout(command, *timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(_)) => self.alert_and_drop(name, metrics),
                    Err(SendTimeoutError::Disconnected(_)) => metrics.decrement_pending(),
                }
            }
            OverflowPolicy::AlertAndDrop => self.alert_and_drop(name, metrics),
        }
    }

    /// Drop an event, alerting on the first drop and every 1000th thereafter
    fn alert_and_drop(&self, name: &str, metrics: &SinkMetrics) {
        metrics.decrement_pending();
        let dropped = metrics.record_dropped() + 1;

        if dropped == 1 || dropped % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Queue for sink '{}' full, {} events dropped. \
                 Consider increasing capacity or using a different overflow policy.",
                name, dropped
            );

            if let Some(ref callback) = self.options.on_overflow {
                callback(name, dropped);
            }
        }
    }

    fn request(
        &self,
        make: impl FnOnce(Sender<Reply>) -> SinkCommand,
        deadline: Option<Instant>,
    ) -> PendingReply {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return PendingReply::Ready(None);
        };

        let (reply_tx, reply_rx) = bounded(1);
        let command = make(reply_tx);
        match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match sender.send_timeout(command, remaining) {
                    Ok(()) => PendingReply::Waiting(reply_rx),
                    Err(SendTimeoutError::Timeout(_)) => PendingReply::TimedOut,
                    Err(SendTimeoutError::Disconnected(_)) => PendingReply::Ready(None),
                }
            }
            None => match sender.send(command) {
                Ok(()) => PendingReply::Waiting(reply_rx),
                Err(_) => PendingReply::Ready(None),
            },
        }
    }
}

/// Background owner of one queued writer
struct Worker {
    name: String,
    writer: Box<dyn SinkWriter>,
    metrics: Arc<SinkMetrics>,
    on_error: ErrorHandler,
    idle_flush: Option<Duration>,
    /// Writes accepted since the last flush
    dirty: bool,
}

impl Worker {
    fn run(mut self, receiver: Receiver<SinkCommand>) {
        loop {
            let command = match (self.dirty, self.idle_flush) {
                (true, Some(idle)) => match receiver.recv_timeout(idle) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        self.idle_flush();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                _ => match receiver.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };

            match command {
                SinkCommand::Write(event) => {
                    let failure =
                        write_isolated(self.writer.as_mut(), &self.name, &event, &self.metrics);
                    if let Some(error) = failure {
                        report_error(&self.on_error, error, event.from_error_handler());
                    }
                    self.dirty = true;
                    self.metrics.decrement_pending();
                }
                SinkCommand::Flush(reply) => {
                    let outcome = flush_isolated(self.writer.as_mut(), &self.name);
                    self.dirty = false;
                    let _ = reply.send(outcome);
                }
                SinkCommand::Close(reply) => {
                    let outcome = close_isolated(self.writer.as_mut(), &self.name);
                    let _ = reply.send(outcome);
                    return;
                }
            }
        }

        // Router dropped without close: drain already happened, release the writer
        if let Some(error) = close_isolated(self.writer.as_mut(), &self.name) {
            eprintln!("[LOGGER ERROR] {}", error);
        }
    }

    fn idle_flush(&mut self) {
        self.dirty = false;
        if let Some(error) = flush_isolated(self.writer.as_mut(), &self.name) {
            report_error(&self.on_error, RouterError::writer(error), false);
        }
    }
}

/// Write one event; the failure is returned so it can be reported unlocked
fn write_isolated(
    writer: &mut dyn SinkWriter,
    name: &str,
    event: &LogEvent,
    metrics: &SinkMetrics,
) -> Option<RouterError> {
    let error = match catch_unwind(AssertUnwindSafe(|| writer.write(event))) {
        Ok(Ok(())) => {
            metrics.record_written();
            return None;
        }
        Ok(Err(e)) => e,
        Err(panic_info) => RouterError::writer_panicked(name, panic_message(panic_info)),
    };

    metrics.record_failed();
    Some(RouterError::write_failure(name, event.clone(), error))
}

fn flush_isolated(writer: &mut dyn SinkWriter, name: &str) -> Reply {
    match catch_unwind(AssertUnwindSafe(|| writer.flush())) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("flush of sink '{}' failed: {}", name, e)),
        Err(panic_info) => Some(format!(
            "sink '{}' panicked during flush: {}",
            name,
            panic_message(panic_info)
        )),
    }
}

fn close_isolated(writer: &mut dyn SinkWriter, name: &str) -> Reply {
    match catch_unwind(AssertUnwindSafe(|| writer.close())) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("close of sink '{}' failed: {}", name, e)),
        Err(panic_info) => Some(format!(
            "sink '{}' panicked during close: {}",
            name,
            panic_message(panic_info)
        )),
    }
}

fn panic_message(panic_info: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
