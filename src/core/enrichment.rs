//! Global enrichment applied to every event before routing

use super::context::RouterContext;
use super::log_event::LogEvent;
use super::property::PropertyValue;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Value substituted when a dynamic supplier fails
pub const UNAVAILABLE: &str = "<unavailable>";

/// Supplier of a property value, evaluated once per event
pub type ValueSupplier =
    Arc<dyn Fn() -> std::result::Result<PropertyValue, String> + Send + Sync>;

/// A single enrichment rule
#[derive(Clone)]
pub enum EnrichmentRule {
    /// Fixed key and value
    Static { key: String, value: PropertyValue },
    /// Value computed at enrichment time
    Dynamic { key: String, supplier: ValueSupplier },
    /// Copies every property of the router's scoped context
    FromContext(RouterContext),
}

impl EnrichmentRule {
    pub fn with_property(key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        EnrichmentRule::Static {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn dynamic<F>(key: impl Into<String>, supplier: F) -> Self
    where
        F: Fn() -> std::result::Result<PropertyValue, String> + Send + Sync + 'static,
    {
        EnrichmentRule::Dynamic {
            key: key.into(),
            supplier: Arc::new(supplier),
        }
    }

    /// `ProcessId` of the current process
    pub fn process_id() -> Self {
        Self::with_property("ProcessId", std::process::id())
    }

    /// `ThreadId` of the emitting thread
    pub fn thread_id() -> Self {
        Self::dynamic("ThreadId", || {
            Ok(format!("{:?}", std::thread::current().id()).into())
        })
    }

    /// `Version` supplied by the composition root, e.g. `env!("CARGO_PKG_VERSION")`
    pub fn version(version: impl Into<PropertyValue>) -> Self {
        Self::with_property("Version", version)
    }

    /// Apply the rule; returns `false` when a supplier failed and the sentinel was used
    fn apply(&self, event: &mut LogEvent) -> bool {
        match self {
            EnrichmentRule::Static { key, value } => {
                event.set_property(key.clone(), value.clone());
                true
            }
            EnrichmentRule::Dynamic { key, supplier } => {
                match catch_unwind(AssertUnwindSafe(|| supplier())) {
                    Ok(Ok(value)) => {
                        event.set_property(key.clone(), value);
                        true
                    }
                    Ok(Err(_)) | Err(_) => {
                        event.set_property(key.clone(), UNAVAILABLE);
                        false
                    }
                }
            }
            EnrichmentRule::FromContext(context) => {
                event.properties.extend(context.snapshot());
                true
            }
        }
    }
}

impl fmt::Debug for EnrichmentRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentRule::Static { key, value } => f
                .debug_struct("Static")
                .field("key", key)
                .field("value", value)
                .finish(),
            EnrichmentRule::Dynamic { key, .. } => {
                f.debug_struct("Dynamic").field("key", key).finish_non_exhaustive()
            }
            EnrichmentRule::FromContext(_) => f.write_str("FromContext"),
        }
    }
}

/// Ordered list of enrichment rules
#[derive(Debug, Clone, Default)]
pub struct EnrichmentStage {
    rules: Vec<EnrichmentRule>,
}

impl EnrichmentStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: EnrichmentRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in registration order
    ///
    /// Returns the number of rules whose supplier failed.
    pub fn enrich(&self, event: &mut LogEvent) -> usize {
        self.rules.iter().filter(|rule| !rule.apply(event)).count()
    }
}
