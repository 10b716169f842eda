//! Run context shared by the hooks of a mock service.
//!
//! A [`RunContext`] is a cheap handle: clones share the same property map and
//! dispatch counter. It is safe to use from many dispatches at once; every
//! operation takes the lock for its own duration only, so hooks are never
//! serialized against each other.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct ContextState {
    name: String,
    properties: RwLock<HashMap<String, Value>>,
    dispatch_count: AtomicU64,
    created_at: chrono::DateTime<chrono::Utc>,
}

/// Script and hook state that outlives a single dispatch.
#[derive(Clone)]
pub struct RunContext {
    state: Arc<ContextState>,
}

impl RunContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(ContextState {
                name: name.into(),
                properties: RwLock::new(HashMap::new()),
                dispatch_count: AtomicU64::new(0),
                created_at: chrono::Utc::now(),
            }),
        }
    }

    /// Create a context pre-populated with properties
    pub fn with_properties(
        name: impl Into<String>,
        properties: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let context = Self::new(name);
        context.state.properties.write().extend(properties);
        context
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.state.created_at
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.properties.read().get(key).cloned()
    }

    /// Set a property, returning the previous value
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.state.properties.write().insert(key.into(), value)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.state.properties.read().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.state.properties.write().remove(key)
    }

    /// Increment a numeric property (returns new value).
    ///
    /// Missing or non-integer values restart the counter at 1.
    pub fn increment(&self, key: &str) -> i64 {
        let mut properties = self.state.properties.write();
        let next = match properties.get(key).and_then(Value::as_i64) {
            Some(current) => current.saturating_add(1),
            None => 1,
        };
        properties.insert(key.to_string(), Value::from(next));
        next
    }

    /// Copy of all properties at this instant
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.state.properties.read().clone()
    }

    /// Number of dispatches that have run against this context
    pub fn dispatch_count(&self) -> u64 {
        self.state.dispatch_count.load(Ordering::Relaxed)
    }

    pub(crate) fn record_dispatch(&self) -> u64 {
        self.state.dispatch_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Whether two handles point at the same context
    pub fn same_as(&self, other: &RunContext) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("name", &self.state.name)
            .field("properties", &self.state.properties.read().len())
            .field("dispatch_count", &self.dispatch_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_get_set_remove() {
        let context = RunContext::new("svc");
        assert!(context.get("missing").is_none());

        assert!(context.set("user", json!({"id": 7})).is_none());
        assert_eq!(context.get("user"), Some(json!({"id": 7})));
        assert!(context.exists("user"));

        let previous = context.set("user", json!("replaced"));
        assert_eq!(previous, Some(json!({"id": 7})));

        assert_eq!(context.remove("user"), Some(json!("replaced")));
        assert!(!context.exists("user"));
    }

    #[test]
    fn test_increment_restarts_on_non_numeric() {
        let context = RunContext::new("svc");
        assert_eq!(context.increment("hits"), 1);
        assert_eq!(context.increment("hits"), 2);

        context.set("hits", json!("text"));
        assert_eq!(context.increment("hits"), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let context = RunContext::with_properties("svc", [("a".to_string(), json!(1))]);
        let clone = context.clone();
        clone.set("b", json!(2));

        assert!(context.same_as(&clone));
        assert_eq!(context.snapshot().len(), 2);
        assert!(!context.same_as(&RunContext::new("svc")));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let context = RunContext::new("svc");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = context.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        context.increment("counter");
                        context.record_dispatch();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(context.get("counter"), Some(json!(2000)));
        assert_eq!(context.dispatch_count(), 2000);
    }
}
