//! Router-owned scoped context
//!
//! - `RouterContext`: properties that persist across events until removed
//! - `ContextGuard`: RAII guard for a scoped property

use super::property::{Properties, PropertyValue};
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared property bag copied into events by the `FromContext` enrichment rule
///
/// Thread-safe: clones share the same underlying properties.
///
/// # Example
///
/// ```
/// use rust_log_router::RouterContext;
///
/// let ctx = RouterContext::new();
/// {
///     let _guard = ctx.push("RequestId", "abc-123");
///     assert_eq!(ctx.len(), 1);
/// }
/// assert!(ctx.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouterContext {
    properties: Arc<RwLock<Properties>>,
}

impl RouterContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property until the returned guard is dropped
    ///
    /// A property shadowed by the push is restored when the guard drops.
    #[must_use = "the property is removed as soon as the guard is dropped"]
    pub fn push<K, V>(&self, key: K, value: V) -> ContextGuard
    where
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let key = key.into();
        let previous = self.properties.write().insert(key.clone(), value.into());
        ContextGuard {
            properties: Arc::clone(&self.properties),
            key,
            previous,
        }
    }

    /// Set a property with no scope; it stays until removed
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        self.properties.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.properties.write().remove(key);
    }

    pub fn clear(&self) {
        self.properties.write().clear();
    }

    /// Snapshot of all current properties
    pub fn snapshot(&self) -> Properties {
        self.properties.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.read().len()
    }
}

/// RAII guard for a scoped context property
pub struct ContextGuard {
    properties: Arc<RwLock<Properties>>,
    key: String,
    previous: Option<PropertyValue>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let mut properties = self.properties.write();
        match self.previous.take() {
            Some(previous) => {
                properties.insert(std::mem::take(&mut self.key), previous);
            }
            None => {
                properties.remove(&self.key);
            }
        }
    }
}
