//! Integration tests for the log router
//!
//! These tests verify:
//! - Per-sink thresholds over a shared event stream
//! - Enrichment reaching every sink, including table columns
//! - Failure isolation between sinks
//! - Flush and close semantics
//! - Configuration-driven construction

use parking_lot::Mutex;
use rust_log_router::prelude::*;
use rust_log_router::sinks::table::{
    ColumnDefinition, ColumnOptions, ColumnType, MemoryTableStore, StandardColumn,
};
use rust_log_router::{SinkMetrics, UNAVAILABLE};
use std::io::Write;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Keeps every event it is given
#[derive(Clone, Default)]
struct Recorder {
    name: &'static str,
    events: Arc<Mutex<Vec<LogEvent>>>,
    delay: Option<Duration>,
}

impl Recorder {
    fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(LogEvent::rendered_message).collect()
    }
}

impl SinkWriter for Recorder {
    fn write(&mut self, event: &LogEvent) -> Result<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        if self.name.is_empty() {
            "recorder"
        } else {
            self.name
        }
    }
}

/// Fails every write, optionally by panicking
struct Broken {
    panic: bool,
}

impl SinkWriter for Broken {
    fn write(&mut self, _event: &LogEvent) -> Result<()> {
        if self.panic {
            panic!("writer exploded");
        }
        Err(RouterError::writer("connection refused"))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn collecting_handler() -> (ErrorHandler, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: ErrorHandler = Arc::new(move |e: &RouterError| {
        let event_id = match e {
            RouterError::WriteFailure { event, .. } => event.event_id,
            _ => 0,
        };
        sink.lock().push(format!("{}#{}: {}", e.sink().unwrap_or("-"), event_id, e));
    });
    (handler, seen)
}

fn sample_table_options() -> TableWriterOptions {
    TableWriterOptions::new("YourTableName")
        .auto_create_table(true)
        .batch_size(1)
        .column_options(
            ColumnOptions::default()
                .remove(StandardColumn::MessageTemplate)
                .remove(StandardColumn::Properties)
                .with_column(ColumnDefinition::new("Version"))
                .with_column(
                    ColumnDefinition::new("ProcessId")
                        .with_property("ProcessId")
                        .with_type(ColumnType::BigInt),
                ),
        )
}

#[test]
fn test_console_and_table_thresholds() {
    let console = SharedBuffer::default();
    let store = MemoryTableStore::new();

    let router = Router::builder()
        .minimum_level(LogLevel::Trace)
        .sink(ConsoleWriter::with_stream(Box::new(console.clone())), LogLevel::Debug)
        .sink(
            TableWriter::new(store.clone(), sample_table_options()).expect("valid options"),
            LogLevel::Information,
        )
        .enrich(EnrichmentRule::process_id())
        .enrich(EnrichmentRule::version("1.0.0"))
        .build();

    router.info("Information sample").expect("router is active");
    router.debug("Debug sample").expect("router is active");
    router.trace("Trace sample").expect("router is active");
    router.close(None).expect("close succeeds");

    let lines = console.lines();
    assert_eq!(lines.len(), 2, "console should show Information and Debug only");
    assert!(lines[0].ends_with("Information sample"));
    assert!(lines[1].ends_with("Debug sample"));

    let table = store.table("YourTableName").expect("table auto-created");
    assert_eq!(table.rows.len(), 1, "table should only hold the Information event");
    assert_eq!(
        store.column_values("YourTableName", "Message"),
        vec![PropertyValue::from("Information sample")]
    );
    assert_eq!(
        store.column_values("YourTableName", "ProcessId"),
        vec![PropertyValue::Int(i64::from(std::process::id()))]
    );
    assert_eq!(
        store.column_values("YourTableName", "Version"),
        vec![PropertyValue::from("1.0.0")]
    );
}

#[test]
fn test_auto_created_table_has_declared_columns() {
    let store = MemoryTableStore::new();
    let router = Router::builder()
        .sink(
            TableWriter::new(store.clone(), sample_table_options()).expect("valid options"),
            LogLevel::Information,
        )
        .build();

    router
        .emit(
            LogLevel::Warning,
            "Disk {Disk} at {Percent}%",
            vec!["C:".into(), 91.into()],
            Properties::from([
                ("Version".to_string(), PropertyValue::from("2.3.4")),
                ("ProcessId".to_string(), PropertyValue::from(77)),
            ]),
        )
        .expect("router is active");
    router.flush(None).expect("flush succeeds");

    let schema = store.table("YourTableName").expect("table exists").schema;
    let version = schema.column("Version").expect("Version column");
    assert_eq!(version.data_type, ColumnType::NVarChar);
    let pid = schema.column("ProcessId").expect("ProcessId column");
    assert_eq!(pid.data_type, ColumnType::BigInt);
    assert!(schema.column("MessageTemplate").is_none());

    assert_eq!(
        store.column_values("YourTableName", "Version"),
        vec![PropertyValue::from("2.3.4")]
    );
    assert_eq!(
        store.column_values("YourTableName", "ProcessId"),
        vec![PropertyValue::Int(77)]
    );
    assert_eq!(
        store.column_values("YourTableName", "Level"),
        vec![PropertyValue::from("Warning")]
    );
}

#[test]
fn test_failing_sink_does_not_block_others() {
    let healthy = Recorder::named("healthy");
    let (handler, seen) = collecting_handler();

    let router = Router::builder()
        .synchronous()
        .sink(Broken { panic: false }, LogLevel::Trace)
        .sink(Broken { panic: true }, LogLevel::Trace)
        .sink(healthy.clone(), LogLevel::Trace)
        .on_error(handler)
        .build();

    router.info("first").expect("router is active");
    router.info("second").expect("router is active");

    assert_eq!(healthy.messages(), vec!["first", "second"]);

    let failures = seen.lock().clone();
    assert_eq!(failures.len(), 4);
    assert!(failures[0].starts_with("broken#1: "));
    assert!(failures[0].contains("connection refused"));
    assert!(failures[1].starts_with("broken-2#1: "));
    assert!(failures[1].contains("panicked"));

    let broken: &SinkMetrics = router.sink_metrics("broken").expect("sink exists");
    assert_eq!(broken.failed(), 2);
    assert_eq!(router.sink_metrics("healthy").map(SinkMetrics::written), Some(2));
}

#[test]
fn test_queued_sinks_isolated() {
    let healthy = Recorder::named("healthy");
    let (handler, seen) = collecting_handler();

    let router = Router::builder()
        .async_mode(64)
        .sink(Broken { panic: true }, LogLevel::Trace)
        .sink(healthy.clone(), LogLevel::Trace)
        .on_error(handler)
        .build();

    for i in 0..10 {
        router
            .emit(LogLevel::Information, "event {N}", vec![i.into()], Properties::new())
            .expect("router is active");
    }
    let report = router.flush(Some(Duration::from_secs(5))).expect("flush completes");

    assert_eq!(healthy.events.lock().len(), 10);
    assert_eq!(report.get("healthy").map(|s| s.written), Some(10));
    assert_eq!(report.get("broken").map(|s| s.failed), Some(10));
    assert_eq!(seen.lock().len(), 10);
    assert_eq!(report.total_pending(), 0);
}

#[test]
fn test_flush_with_nothing_pending() {
    let router = Router::builder()
        .async_mode(16)
        .sink(Recorder::named("a"), LogLevel::Trace)
        .sink(Recorder::named("b"), LogLevel::Error)
        .build();

    let report = router.flush(Some(Duration::from_secs(1))).expect("flush completes");
    assert!(report.is_clean());
    assert_eq!(report.sinks.len(), 2);
    assert!(report.sinks.iter().all(|s| s.pending == 0));
    assert!(!router.is_closed(), "flush must not close the router");
}

#[test]
fn test_flush_timeout_reports_pending() {
    let slow = Recorder {
        name: "slow",
        delay: Some(Duration::from_millis(100)),
        ..Recorder::default()
    };
    let router = Router::builder()
        .async_mode(64)
        .sink(slow.clone(), LogLevel::Trace)
        .build();

    for _ in 0..5 {
        router.info("slow event").expect("router is active");
    }

    match router.flush(Some(Duration::from_millis(20))) {
        Err(RouterError::FlushTimeout { pending }) => {
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].sink, "slow");
            assert!(pending[0].pending > 0);
        }
        other => panic!("expected a flush timeout, got {:?}", other.map(|r| r.sinks)),
    }

    router.close(Some(Duration::from_secs(5))).expect("close completes");
    assert_eq!(slow.events.lock().len(), 5);
}

#[test]
fn test_closed_router_rejects_work() {
    let recorder = Recorder::default();
    let router = Router::builder().sink(recorder.clone(), LogLevel::Trace).build();

    router.info("before close").expect("router is active");
    router.close(None).expect("close succeeds");

    assert!(matches!(router.info("after close"), Err(RouterError::Closed)));
    assert!(matches!(router.flush(None), Err(RouterError::Closed)));
    assert_eq!(recorder.messages(), vec!["before close"]);
    assert_eq!(router.metrics().rejected_after_close(), 2);

    let second = router.close(None).expect("second close is a no-op");
    assert!(second.sinks.is_empty());
}

#[test]
fn test_context_properties_are_scoped() {
    let recorder = Recorder::default();
    let router = Router::builder()
        .sink(recorder.clone(), LogLevel::Trace)
        .enrich_from_context()
        .build();

    {
        let _request = router.push_property("RequestId", "r-42");
        router.info("inside").expect("router is active");
    }
    router.info("outside").expect("router is active");
    router.flush(None).expect("flush succeeds");

    let events = recorder.events.lock();
    assert_eq!(events[0].property("RequestId"), Some(&PropertyValue::from("r-42")));
    assert_eq!(events[1].property("RequestId"), None);
}

#[test]
fn test_enrichment_failure_uses_sentinel() {
    let recorder = Recorder::default();
    let router = Router::builder()
        .sink(recorder.clone(), LogLevel::Trace)
        .enrich(EnrichmentRule::dynamic("Version", || Err("no manifest".to_string())))
        .enrich(EnrichmentRule::dynamic("Host", || panic!("lookup crashed")))
        .build();

    router.info("still delivered").expect("router is active");
    router.flush(None).expect("flush succeeds");

    let events = recorder.events.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].property("Version"), Some(&PropertyValue::from(UNAVAILABLE)));
    assert_eq!(events[0].property("Host"), Some(&PropertyValue::from(UNAVAILABLE)));
    assert_eq!(router.metrics().enrichment_failures(), 2);
}

#[test]
fn test_fatal_with_exception_reaches_table() {
    #[derive(Debug, thiserror::Error)]
    #[error("configuration could not be loaded")]
    struct Outer(#[source] std::io::Error);

    let store = MemoryTableStore::new();
    let router = Router::builder()
        .sink(
            TableWriter::new(store.clone(), sample_table_options()).expect("valid options"),
            LogLevel::Information,
        )
        .build();

    let error = Outer(std::io::Error::new(std::io::ErrorKind::NotFound, "appsettings.json"));
    router
        .fatal_with_exception(&error, "Exception was found.")
        .expect("router is active");
    router.close(None).expect("close succeeds");

    let exceptions = store.column_values("YourTableName", "Exception");
    let PropertyValue::String(text) = &exceptions[0] else {
        panic!("exception column should hold text");
    };
    assert!(text.contains("configuration could not be loaded"));
    assert!(text.contains("caused by: appsettings.json"));
}

#[test]
fn test_schema_mismatch_goes_to_error_handler() {
    let options = sample_table_options().auto_create_table(false);
    let mut existing = options.column_options.schema("YourTableName");
    existing.columns.retain(|c| c.name != "ProcessId");
    let store = MemoryTableStore::with_table(existing);

    let console = Recorder::named("console");
    let (handler, seen) = collecting_handler();
    let router = Router::builder()
        .sink(console.clone(), LogLevel::Trace)
        .sink(TableWriter::new(store.clone(), options).expect("valid options"), LogLevel::Trace)
        .on_error(handler)
        .build();

    router.info("hello").expect("router is active");
    router.flush(None).expect("flush succeeds");

    assert_eq!(console.messages(), vec!["hello"]);
    assert!(store.rows("YourTableName").is_empty());
    let failures = seen.lock();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("Schema mismatch"));
    assert!(failures[0].contains("ProcessId"));
}

#[test]
fn test_log_injection_prevention() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("injection_test.log");

    let router = Router::builder()
        .sink(FileWriter::new(&log_file).expect("Failed to create writer"), LogLevel::Information)
        .build();

    router
        .emit(
            LogLevel::Information,
            "User {User} logged in",
            vec!["eve\nERROR [2024-10-17] Fake error injected".into()],
            Properties::new(),
        )
        .expect("router is active");
    router.close(None).expect("close succeeds");

    let content = std::fs::read_to_string(&log_file).expect("Failed to read log file");
    assert!(content.contains("\\n"));
    assert_eq!(content.lines().count(), 1, "Log should be a single line");
}

#[test]
fn test_router_from_json_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("app.log");
    let settings = temp_dir.path().join("appsettings.json");

    let json = serde_json::json!({
        "ConnectionStrings": { "MyDb": "memory:" },
        "MinimumLevel": "Debug",
        "Properties": { "Version": "9.9.9" },
        "Sinks": [
            { "Kind": "File", "Path": log_file, "MinimumLevel": "Warning", "OutputFormat": "Json" },
            { "Kind": "Table", "ConnectionStringName": "MyDb", "AutoCreateTable": true }
        ]
    });
    std::fs::write(&settings, json.to_string()).expect("Failed to write settings");

    let config = RouterConfig::from_json_file(&settings).expect("valid config");
    let router = Router::from_config(&config, &DefaultStores).expect("router builds");

    router.trace("below router minimum").expect("router is active");
    router.info("below file threshold").expect("router is active");
    router.warn("disk almost full").expect("router is active");
    router.close(None).expect("close succeeds");

    assert_eq!(router.metrics().below_minimum(), 1);

    let content = std::fs::read_to_string(&log_file).expect("Failed to read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    let parsed: serde_json::Value = serde_json::from_str(lines[0]).expect("JSON line");
    assert_eq!(parsed["message"], "disk almost full");
    assert_eq!(parsed["Version"], "9.9.9");
}

/// Error handler that reports every failure by logging through the router
fn relogging_handler() -> (ErrorHandler, Arc<OnceLock<Weak<Router>>>, Arc<Mutex<usize>>) {
    let slot: Arc<OnceLock<Weak<Router>>> = Arc::new(OnceLock::new());
    let calls = Arc::new(Mutex::new(0));
    let (handler_slot, handler_calls) = (Arc::clone(&slot), Arc::clone(&calls));
    let handler: ErrorHandler = Arc::new(move |e: &RouterError| {
        *handler_calls.lock() += 1;
        if let Some(router) = handler_slot.get().and_then(Weak::upgrade) {
            let _ = router.warn(format!("sink failed: {}", e.sink().unwrap_or("-")));
        }
    });
    (handler, slot, calls)
}

#[test]
fn test_error_handler_may_log_through_router() {
    let recorder = Recorder::named("audit");
    let (handler, slot, calls) = relogging_handler();
    let router = Arc::new(
        Router::builder()
            .synchronous()
            .sink(Broken { panic: false }, LogLevel::Trace)
            .sink(recorder.clone(), LogLevel::Trace)
            .on_error(handler)
            .build(),
    );
    let _ = slot.set(Arc::downgrade(&router));

    router.info("hello").expect("router is active");

    // The handler's own event fails on the broken sink too; that goes to stderr
    assert_eq!(*calls.lock(), 1);
    assert_eq!(recorder.messages(), vec!["sink failed: broken", "hello"]);
    assert_eq!(router.sink_metrics("broken").map(SinkMetrics::failed), Some(2));
}

#[test]
fn test_error_handler_may_log_through_queued_router() {
    let recorder = Recorder::named("audit");
    let (handler, slot, calls) = relogging_handler();
    let router = Arc::new(
        Router::builder()
            .sink(Broken { panic: true }, LogLevel::Trace)
            .sink(recorder.clone(), LogLevel::Trace)
            .on_error(handler)
            .build(),
    );
    let _ = slot.set(Arc::downgrade(&router));

    router.info("hello").expect("router is active");
    // The first flush lets the broken sink's worker run the handler, the
    // second drains what the handler logged
    router.flush(Some(Duration::from_secs(5))).expect("flush completes");
    router.flush(Some(Duration::from_secs(5))).expect("flush completes");

    assert_eq!(*calls.lock(), 1);
    let mut messages = recorder.messages();
    messages.sort();
    assert_eq!(messages, vec!["hello", "sink failed: broken"]);
    assert_eq!(router.sink_metrics("broken").map(SinkMetrics::failed), Some(2));
}

#[test]
fn test_emit_does_not_wait_for_slow_sinks() {
    let slow = Recorder {
        name: "slow",
        delay: Some(Duration::from_millis(200)),
        ..Recorder::default()
    };
    let router = Router::builder().sink(slow.clone(), LogLevel::Trace).build();

    let started = std::time::Instant::now();
    for _ in 0..3 {
        router.info("queued by default").expect("router is active");
    }
    assert!(started.elapsed() < Duration::from_millis(200));

    router.close(Some(Duration::from_secs(5))).expect("close completes");
    assert_eq!(slow.events.lock().len(), 3);
}

#[cfg(feature = "sqlite")]
#[test]
fn test_sqlite_table_round_trip() {
    use rust_log_router::sinks::table::{SqliteTableStore, TableStore};

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", temp_dir.path().join("logs.db").display());

    let store = SqliteTableStore::connect(&url).expect("database opens");
    let router = Router::builder()
        .sink(
            TableWriter::new(store, sample_table_options()).expect("valid options"),
            LogLevel::Information,
        )
        .enrich(EnrichmentRule::process_id())
        .enrich(EnrichmentRule::version("1.0.0"))
        .build();

    router.info("Information sample").expect("router is active");
    router.debug("Debug sample").expect("router is active");
    let report = router.close(Some(Duration::from_secs(10))).expect("close completes");
    assert!(report.is_clean(), "{:?}", report.errors().collect::<Vec<_>>());
    assert_eq!(report.get("table").map(|s| (s.written, s.failed)), Some((1, 0)));

    let mut reopened = SqliteTableStore::connect(&url).expect("database reopens");
    let actual = reopened
        .table_schema("YourTableName")
        .expect("schema readable")
        .expect("table auto-created");
    sample_table_options()
        .column_options
        .schema("YourTableName")
        .check_compatible(&actual)
        .expect("declared columns exist");

    let pool = reopened.pool().expect("store is open");
    let rows: Vec<(String, String, String, i64)> = reopened
        .block_on(
            sqlx::query_as(
                "SELECT \"Message\", \"Level\", \"Version\", \"ProcessId\" FROM \"YourTableName\"",
            )
            .fetch_all(pool),
        )
        .expect("rows readable");
    assert_eq!(
        rows,
        vec![(
            "Information sample".to_string(),
            "Information".to_string(),
            "1.0.0".to_string(),
            i64::from(std::process::id()),
        )]
    );
}
