//! Core router types and traits

pub mod context;
pub mod dispatch;
pub mod enrichment;
pub mod error;
pub mod filter;
pub mod flush;
pub mod log_event;
pub mod log_level;
pub mod metrics;
pub mod output_format;
pub mod overflow_policy;
pub mod property;
pub mod router;
pub mod sink;
pub mod template;
pub mod timestamp;

pub use context::{ContextGuard, RouterContext};
pub use dispatch::{default_error_handler, ErrorHandler, QueueOptions, DEFAULT_IDLE_FLUSH};
pub use enrichment::{EnrichmentRule, EnrichmentStage, ValueSupplier, UNAVAILABLE};
pub use error::{Result, RouterError, SinkPending};
pub use filter::{admit, SinkFilter};
pub use flush::{FlushReport, SinkFlushStatus};
pub use log_event::LogEvent;
pub use log_level::LogLevel;
pub use metrics::{RouterMetrics, SinkMetrics};
pub use output_format::OutputFormat;
pub use overflow_policy::{LogPriority, OverflowCallback, OverflowPolicy};
pub use property::{format_properties, Properties, PropertyValue};
pub use router::{Router, RouterBuilder, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT};
pub use sink::SinkWriter;
pub use template::MessageTemplate;
pub use timestamp::TimestampFormat;
