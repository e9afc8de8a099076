//! Criterion benchmarks for rust_log_router

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_log_router::prelude::*;
use rust_log_router::sinks::table::{ColumnDefinition, ColumnOptions, ColumnType, MemoryTableStore};

/// Discards everything; measures routing overhead only
struct NullWriter;

impl SinkWriter for NullWriter {
    fn write(&mut self, event: &LogEvent) -> Result<()> {
        black_box(event);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

// ============================================================================
// Emit path
// ============================================================================

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");
    group.throughput(Throughput::Elements(1));

    let router = Router::builder()
        .synchronous()
        .sink(NullWriter, LogLevel::Trace)
        .build();
    group.bench_function("direct_plain", |b| {
        b.iter(|| router.info(black_box("Request processed")))
    });

    group.bench_function("direct_template", |b| {
        b.iter(|| {
            router.emit(
                LogLevel::Information,
                black_box("Request {RequestId} took {Elapsed} ms"),
                vec!["r-1".into(), 12.into()],
                Properties::new(),
            )
        })
    });

    group.bench_function("below_minimum", |b| {
        let quiet = Router::builder()
            .synchronous()
            .minimum_level(LogLevel::Warning)
            .sink(NullWriter, LogLevel::Trace)
            .build();
        b.iter(|| quiet.debug(black_box("dropped early")))
    });

    let queued = Router::builder()
        .async_mode(65_536)
        .overflow_policy(OverflowPolicy::DropNewest)
        .sink(NullWriter, LogLevel::Trace)
        .build();
    group.bench_function("queued_plain", |b| {
        b.iter(|| queued.info(black_box("Request processed")))
    });

    group.finish();
}

// ============================================================================
// Fan-out and enrichment
// ============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    group.throughput(Throughput::Elements(1));

    for sinks in [1usize, 2, 4, 8] {
        let router = (0..sinks)
            .fold(Router::builder().synchronous(), |b, _| b.sink(NullWriter, LogLevel::Trace))
            .enrich(EnrichmentRule::process_id())
            .enrich(EnrichmentRule::version("1.0.0"))
            .build();

        group.bench_with_input(BenchmarkId::from_parameter(sinks), &router, |b, router| {
            b.iter(|| router.info(black_box("fan out")))
        });
    }

    group.finish();
}

// ============================================================================
// Table rows
// ============================================================================

fn bench_table_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_writer");
    group.throughput(Throughput::Elements(1));

    for batch in [1usize, 50] {
        let options = TableWriterOptions::new("Logs")
            .auto_create_table(true)
            .batch_size(batch)
            .column_options(ColumnOptions::default().with_column(
                ColumnDefinition::new("ProcessId").with_type(ColumnType::BigInt),
            ));
        let mut writer = TableWriter::new(MemoryTableStore::new(), options)
            .unwrap_or_else(|e| panic!("invalid options: {}", e));

        let mut event = LogEvent::new(1, LogLevel::Information, "Row {N}").with_args(vec![1.into()]);
        event.set_property("ProcessId", 42u32);

        group.bench_function(BenchmarkId::new("write", batch), |b| {
            b.iter(|| writer.write(black_box(&event)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_emit, bench_fan_out, bench_table_writer);
criterion_main!(benches);
