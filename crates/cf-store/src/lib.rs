//! CoinForge Reactive Store
//!
//! Shared, named mutable state with change notification. The store is the
//! indirection layer between modules that must not reference each other
//! directly: one module publishes under a key, another subscribes to it.
//!
//! Notification policy: `set` always notifies subscribers of the key, even
//! when the value is unchanged; `update` notifies only when the updater
//! produces a value different from the previous one.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type StoreHandler = Arc<dyn Fn(&Value, Option<&Value>) + Send + Sync>;

/// Handle returned by `subscribe`, used by `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreSubId(u64);

struct Subscriber {
    id: StoreSubId,
    handler: StoreHandler,
}

struct StoreInner {
    state: HashMap<String, Value>,
    subs: HashMap<String, Vec<Subscriber>>,
}

/// Key-value state container with per-key subscriptions
pub struct Store {
    inner: Mutex<StoreInner>,
    next_id: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Self::with_initial(HashMap::new())
    }

    pub fn with_initial(initial: HashMap<String, Value>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                state: initial,
                subs: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a shared store handle.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().state.get(key).cloned()
    }

    /// Snapshot copy of the whole state, not a live reference.
    pub fn get_all(&self) -> HashMap<String, Value> {
        self.inner.lock().state.clone()
    }

    /// Assign `value` to `key` and notify subscribers of that key.
    /// Always notifies, even when the value is unchanged.
    pub fn set(&self, key: &str, value: Value) {
        let (prev, subs) = {
            let mut inner = self.inner.lock();
            let prev = inner.state.insert(key.to_string(), value.clone());
            (prev, snapshot_subs(&inner, key))
        };
        notify(key, &subs, &value, prev.as_ref());
    }

    /// Apply `updater` to the previous value and assign the result.
    /// Notifies only when the produced value differs from the previous one.
    ///
    /// The updater runs outside the store's lock, so it may read or write
    /// the store itself.
    pub fn update<F>(&self, key: &str, updater: F)
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let prev = self.get(key);
        let next = updater(prev.as_ref());
        if prev.as_ref() == Some(&next) {
            return;
        }
        let subs = {
            let mut inner = self.inner.lock();
            inner.state.insert(key.to_string(), next.clone());
            snapshot_subs(&inner, key)
        };
        notify(key, &subs, &next, prev.as_ref());
    }

    /// Subscribe to changes of `key`. The handler receives the new value and
    /// the previous one, if any.
    pub fn subscribe<F>(&self, key: &str, handler: F) -> StoreSubId
    where
        F: Fn(&Value, Option<&Value>) + Send + Sync + 'static,
    {
        let id = StoreSubId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.inner.lock();
        inner.subs.entry(key.to_string()).or_default().push(Subscriber {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    pub fn unsubscribe(&self, key: &str, id: StoreSubId) {
        let mut inner = self.inner.lock();
        if let Some(arr) = inner.subs.get_mut(key) {
            arr.retain(|s| s.id != id);
            if arr.is_empty() {
                inner.subs.remove(key);
            }
        }
    }

    /// Number of subscribers currently attached to `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.lock().subs.get(key).map_or(0, Vec::len)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot-then-iterate: subscriptions changed by a handler must not
/// affect the in-flight notification pass.
fn snapshot_subs(inner: &StoreInner, key: &str) -> Vec<StoreHandler> {
    inner
        .subs
        .get(key)
        .map(|arr| arr.iter().map(|s| Arc::clone(&s.handler)).collect())
        .unwrap_or_default()
}

fn notify(key: &str, subs: &[StoreHandler], value: &Value, prev: Option<&Value>) {
    for handler in subs {
        let result = catch_unwind(AssertUnwindSafe(|| handler(value, prev)));
        if result.is_err() {
            log::error!("[store] subscriber panicked for \"{}\"", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_always_notifies() {
        let store = Store::new();
        store.set("x", json!(1));

        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls2 = Arc::clone(&calls);
        store.subscribe("x", move |value, prev| {
            calls2.lock().push((value.clone(), prev.cloned()));
        });

        // Same value: still notifies, prev == new.
        store.set("x", json!(1));
        assert_eq!(*calls.lock(), vec![(json!(1), Some(json!(1)))]);
    }

    #[test]
    fn test_update_suppresses_noop() {
        let store = Store::new();
        store.set("x", json!(1));

        let calls = Arc::new(Mutex::new(0u32));
        let calls2 = Arc::clone(&calls);
        store.subscribe("x", move |_, _| *calls2.lock() += 1);

        store.update("x", |prev| prev.cloned().unwrap_or(Value::Null));
        assert_eq!(*calls.lock(), 0);

        store.update("x", |_| json!(2));
        assert_eq!(*calls.lock(), 1);
        assert_eq!(store.get("x"), Some(json!(2)));
    }

    #[test]
    fn test_updater_may_reenter_the_store() {
        let store = Store::new();
        store.set("base", json!(2));
        store.set("x", json!(1));

        store.update("x", |prev| {
            let base = store.get("base").and_then(|v| v.as_i64()).unwrap();
            json!(prev.and_then(Value::as_i64).unwrap() + base)
        });
        assert_eq!(store.get("x"), Some(json!(3)));
    }

    #[test]
    fn test_notifies_only_exact_key() {
        let store = Store::new();
        let calls = Arc::new(Mutex::new(0u32));
        let calls2 = Arc::clone(&calls);
        store.subscribe("a", move |_, _| *calls2.lock() += 1);

        store.set("b", json!(true));
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let store = Store::new();
        let calls = Arc::new(Mutex::new(0u32));
        let calls2 = Arc::clone(&calls);
        let id = store.subscribe("x", move |_, _| *calls2.lock() += 1);

        store.unsubscribe("x", id);
        store.set("x", json!(1));
        assert_eq!(*calls.lock(), 0);
        assert_eq!(store.subscriber_count("x"), 0);
    }

    #[test]
    fn test_get_all_is_snapshot() {
        let store = Store::new();
        store.set("x", json!(1));
        let snapshot = store.get_all();
        store.set("x", json!(2));
        assert_eq!(snapshot.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let store = Store::new();
        store.subscribe("x", |_, _| panic!("bad subscriber"));

        let calls = Arc::new(Mutex::new(0u32));
        let calls2 = Arc::clone(&calls);
        store.subscribe("x", move |_, _| *calls2.lock() += 1);

        store.set("x", json!(1));
        assert_eq!(*calls.lock(), 1);
    }
}
