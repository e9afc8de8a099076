//! Logs one event to a console and a database table with different thresholds.
//!
//! Reads the `MyDb` connection string from `appsettings.json` in the working
//! directory. The console shows everything; the table keeps `Information`
//! and above, with `Version` and `ProcessId` columns filled by enrichment.

use rust_log_router::prelude::*;
use rust_log_router::sinks::table::{ColumnDefinition, ColumnOptions, ColumnType, StandardColumn};
use std::process::ExitCode;

const SETTINGS_FILE: &str = "appsettings.json";
const CONNECTION_NAME: &str = "MyDb";
const TABLE_NAME: &str = "YourTableName";

fn configure() -> Result<Router> {
    let config = RouterConfig::from_optional_json_file(SETTINGS_FILE)?;
    let connection = config.connection_string(CONNECTION_NAME).ok_or_else(|| {
        RouterError::config(
            "ConnectionStrings",
            format!("missing connection string '{}'", CONNECTION_NAME),
        )
    })?;

    let columns = ColumnOptions::default()
        .remove(StandardColumn::MessageTemplate)
        .remove(StandardColumn::Properties)
        .with_column(ColumnDefinition::new("Version"))
        .with_column(
            ColumnDefinition::new("ProcessId")
                .with_property("ProcessId")
                .with_type(ColumnType::BigInt),
        );

    let table = TableWriter::with_boxed_store(
        DefaultStores.open(connection)?,
        TableWriterOptions::new(TABLE_NAME)
            .auto_create_table(true)
            .column_options(columns),
    )?;

    Ok(Router::builder()
        .minimum_level(LogLevel::Trace)
        .sink(ConsoleWriter::new(), LogLevel::Trace)
        .sink(table, LogLevel::Information)
        .enrich_from_context()
        .enrich(EnrichmentRule::process_id())
        .enrich(EnrichmentRule::version(env!("CARGO_PKG_VERSION")))
        .build())
}

fn run(router: &Router) -> Result<()> {
    router.info("Information sample, this will be shown in both console and the database table")?;
    router.debug("Debug sample, this will be shown only in console")?;
    Ok(())
}

fn main() -> ExitCode {
    let (router, outcome) = match configure() {
        Ok(router) => {
            let outcome = run(&router);
            (router, outcome)
        }
        // Still report the failure somewhere
        Err(e) => (
            Router::builder().sink(ConsoleWriter::new(), LogLevel::Trace).build(),
            Err(e),
        ),
    };

    let mut code = match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = router.fatal_with_exception(&e, "Exception was found.");
            ExitCode::FAILURE
        }
    };

    match router.close(Some(DEFAULT_SHUTDOWN_TIMEOUT)) {
        Ok(report) => {
            for (sink, error) in report.errors() {
                eprintln!("[LOGGER ERROR] Sink '{}' failed to flush: {}", sink, error);
            }
            for status in report.sinks.iter().filter(|s| s.failed > 0) {
                eprintln!(
                    "[LOGGER ERROR] Sink '{}' failed to write {} events",
                    status.sink, status.failed
                );
                code = ExitCode::FAILURE;
            }
        }
        Err(e) => {
            eprintln!("[LOGGER WARNING] {}", e);
            code = ExitCode::FAILURE;
        }
    }
    code
}
