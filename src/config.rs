//! Declarative router configuration
//!
//! Mirrors an `appsettings.json` layout:
//!
//! ```json
//! {
//!   "ConnectionStrings": { "MyDb": "sqlite://logs.db" },
//!   "MinimumLevel": "Verbose",
//!   "Enrich": ["FromLogContext", "WithProcessId"],
//!   "Properties": { "Version": "1.0.0" },
//!   "Sinks": [
//!     { "Kind": "Console", "MinimumLevel": "Verbose" },
//!     { "Kind": "Table", "MinimumLevel": "Information",
//!       "ConnectionStringName": "MyDb", "TableName": "Logs", "AutoCreateTable": true }
//!   ]
//! }
//! ```

use crate::core::{
    EnrichmentRule, LogLevel, OutputFormat, OverflowPolicy, Properties, Result, Router,
    RouterBuilder, RouterError,
};
use crate::sinks::table::{MemoryTableStore, TableStore, TableWriter, TableWriterOptions};
use crate::sinks::{ConsoleWriter, FileWriter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouterConfig {
    #[serde(default)]
    pub connection_strings: BTreeMap<String, String>,
    #[serde(default = "default_minimum_level")]
    pub minimum_level: LogLevel,
    /// Queue settings shared by every sink; defaults apply when absent
    #[serde(default)]
    pub queue: Option<QueueConfig>,
    /// Write sinks on the emitting thread; `Queue` must then be absent
    #[serde(default)]
    pub synchronous: bool,
    #[serde(default)]
    pub enrich: Vec<EnricherKind>,
    /// Static properties attached to every event
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

fn default_minimum_level() -> LogLevel {
    LogLevel::Trace
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            connection_strings: BTreeMap::new(),
            minimum_level: default_minimum_level(),
            queue: None,
            synchronous: false,
            enrich: Vec::new(),
            properties: Properties::new(),
            sinks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnricherKind {
    FromLogContext,
    WithProcessId,
    WithThreadId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicyKind {
    DropNewest,
    Block,
    BlockWithTimeout,
    AlertAndDrop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueConfig {
    pub capacity: usize,
    #[serde(default = "default_overflow_policy")]
    pub overflow_policy: OverflowPolicyKind,
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,
}

fn default_overflow_policy() -> OverflowPolicyKind {
    OverflowPolicyKind::AlertAndDrop
}

fn default_block_timeout_ms() -> u64 {
    100
}

impl QueueConfig {
    pub fn overflow_policy(&self) -> OverflowPolicy {
        match self.overflow_policy {
            OverflowPolicyKind::DropNewest => OverflowPolicy::DropNewest,
            OverflowPolicyKind::Block => OverflowPolicy::Block,
            OverflowPolicyKind::BlockWithTimeout => {
                OverflowPolicy::BlockWithTimeout(Duration::from_millis(self.block_timeout_ms))
            }
            OverflowPolicyKind::AlertAndDrop => OverflowPolicy::AlertAndDrop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Kind", rename_all_fields = "PascalCase")]
pub enum SinkConfig {
    Console {
        #[serde(default = "default_minimum_level")]
        minimum_level: LogLevel,
        #[serde(default)]
        output_format: OutputFormat,
    },
    File {
        path: PathBuf,
        #[serde(default = "default_minimum_level")]
        minimum_level: LogLevel,
        #[serde(default)]
        output_format: OutputFormat,
    },
    Table {
        connection_string_name: String,
        #[serde(default = "default_minimum_level")]
        minimum_level: LogLevel,
        #[serde(flatten)]
        options: TableWriterOptions,
    },
}

impl SinkConfig {
    pub fn minimum_level(&self) -> LogLevel {
        match self {
            SinkConfig::Console { minimum_level, .. }
            | SinkConfig::File { minimum_level, .. }
            | SinkConfig::Table { minimum_level, .. } => *minimum_level,
        }
    }
}

/// Opens table stores for connection strings named in the configuration
pub trait StoreFactory {
    fn open(&self, connection_string: &str) -> Result<Box<dyn TableStore>>;
}

impl<F> StoreFactory for F
where
    F: Fn(&str) -> Result<Box<dyn TableStore>>,
{
    fn open(&self, connection_string: &str) -> Result<Box<dyn TableStore>> {
        self(connection_string)
    }
}

/// Resolves `memory:` to a fresh [`MemoryTableStore`] and, with the `sqlite`
/// feature, `sqlite:` URLs to a [`SqliteTableStore`](crate::sinks::table::SqliteTableStore)
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStores;

impl StoreFactory for DefaultStores {
    fn open(&self, connection_string: &str) -> Result<Box<dyn TableStore>> {
        if connection_string.starts_with("memory:") {
            return Ok(Box::new(MemoryTableStore::new()));
        }

        #[cfg(feature = "sqlite")]
        if connection_string.starts_with("sqlite:") {
            let store = crate::sinks::table::SqliteTableStore::connect(connection_string)?;
            return Ok(Box::new(store));
        }

        Err(RouterError::config(
            "ConnectionStrings",
            format!("no table store available for '{}'", connection_string),
        ))
    }
}

impl RouterConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Like [`from_json_file`](Self::from_json_file), but a missing file
    /// yields the default configuration
    pub fn from_optional_json_file(path: impl AsRef<Path>) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json_str(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn connection_string(&self, name: &str) -> Option<&str> {
        self.connection_strings.get(name).map(String::as_str)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(queue) = &self.queue {
            if self.synchronous {
                return Err(RouterError::config(
                    "Queue",
                    "a synchronous router has no queue to configure",
                ));
            }
            if queue.capacity == 0 {
                return Err(RouterError::config("Queue", "capacity must be at least 1"));
            }
            if queue.overflow_policy == OverflowPolicyKind::BlockWithTimeout
                && queue.block_timeout_ms == 0
            {
                return Err(RouterError::config("Queue", "block timeout must be positive"));
            }
        }

        for key in self.properties.keys() {
            if key.is_empty() {
                return Err(RouterError::config("Properties", "property name is empty"));
            }
        }

        for sink in &self.sinks {
            match sink {
                SinkConfig::Console { .. } => {}
                SinkConfig::File { path, .. } => {
                    if path.as_os_str().is_empty() {
                        return Err(RouterError::config("File", "path is empty"));
                    }
                }
                SinkConfig::Table {
                    connection_string_name,
                    options,
                    ..
                } => {
                    if self.connection_string(connection_string_name).is_none() {
                        return Err(RouterError::config(
                            "ConnectionStrings",
                            format!("unknown connection string '{}'", connection_string_name),
                        ));
                    }
                    options.validate()?;
                }
            }
        }
        Ok(())
    }

    /// Builder with every configured sink and enricher, for further
    /// programmatic setup
    pub fn builder(&self, stores: &dyn StoreFactory) -> Result<RouterBuilder> {
        self.validate()?;

        let mut builder = Router::builder().minimum_level(self.minimum_level);

        if self.synchronous {
            builder = builder.synchronous();
        }
        if let Some(queue) = &self.queue {
            builder = builder
                .async_mode(queue.capacity)
                .overflow_policy(queue.overflow_policy());
        }

        for kind in &self.enrich {
            builder = match kind {
                EnricherKind::FromLogContext => builder.enrich_from_context(),
                EnricherKind::WithProcessId => builder.enrich(EnrichmentRule::process_id()),
                EnricherKind::WithThreadId => builder.enrich(EnrichmentRule::thread_id()),
            };
        }
        for (key, value) in &self.properties {
            builder = builder.enrich_with_property(key.clone(), value.clone());
        }

        for sink in &self.sinks {
            builder = match sink {
                SinkConfig::Console {
                    minimum_level,
                    output_format,
                } => builder.sink(
                    ConsoleWriter::new().with_output_format(*output_format),
                    *minimum_level,
                ),
                SinkConfig::File {
                    path,
                    minimum_level,
                    output_format,
                } => builder.sink(
                    FileWriter::new(path)?.with_output_format(*output_format),
                    *minimum_level,
                ),
                SinkConfig::Table {
                    connection_string_name,
                    minimum_level,
                    options,
                } => {
                    let connection = self
                        .connection_string(connection_string_name)
                        .unwrap_or_default();
                    let store = stores.open(connection)?;
                    let writer = TableWriter::with_boxed_store(store, options.clone())?;
                    builder.sink(writer, *minimum_level)
                }
            };
        }

        Ok(builder)
    }
}

impl Router {
    /// Build a router from configuration, opening table stores through `stores`
    pub fn from_config(config: &RouterConfig, stores: &dyn StoreFactory) -> Result<Router> {
        Ok(config.builder(stores)?.build())
    }
}
