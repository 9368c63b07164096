//! Bus implementation

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Payload carried by every event
pub type Payload = Arc<dyn Any + Send + Sync>;

type Handler = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Handle returned by `on`/`once`, used for explicit unsubscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscription options: dispatch priority and owning module key
#[derive(Debug, Clone, Default)]
pub struct SubscribeOpts {
    /// Higher priority fires earlier; equal priorities keep insertion order
    pub priority: i32,
    /// Module key for bulk removal via `off_module`
    pub owner: Option<String>,
}

impl SubscribeOpts {
    pub fn priority(priority: i32) -> Self {
        Self {
            priority,
            owner: None,
        }
    }

    pub fn owner(owner: &str) -> Self {
        Self {
            priority: 0,
            owner: Some(owner.to_string()),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

struct Listener {
    id: SubscriptionId,
    handler: Handler,
    priority: i32,
    owner: Option<String>,
    once: bool,
}

/// The event bus. Cheap to share: all state sits behind one mutex that is
/// never held while a handler runs.
pub struct EventBus {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_id: AtomicU64,
    debug: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            debug: AtomicBool::new(false),
        }
    }

    /// Create a shared bus handle.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Verbose logging toggle. Purely observational.
    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::Relaxed);
    }

    fn debug_log(&self, msg: impl FnOnce() -> String) {
        if self.debug.load(Ordering::Relaxed) {
            log::debug!("[bus] {}", msg());
        }
    }

    /// Register a handler for `event`. Handlers for the same event are kept
    /// sorted by descending priority; ties keep insertion order.
    pub fn on<F>(&self, event: &str, opts: SubscribeOpts, handler: F) -> SubscriptionId
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.register(event, opts, Arc::new(handler), false)
    }

    /// Like `on`, but the handler self-unsubscribes after its first delivery.
    pub fn once<F>(&self, event: &str, opts: SubscribeOpts, handler: F) -> SubscriptionId
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.register(event, opts, Arc::new(handler), true)
    }

    fn register(
        &self,
        event: &str,
        opts: SubscribeOpts,
        handler: Handler,
        once: bool,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.debug_log(|| {
            format!(
                "on {} owner={:?} priority={}",
                event, opts.owner, opts.priority
            )
        });

        let mut listeners = self.listeners.lock();
        let arr = listeners.entry(event.to_string()).or_default();
        arr.push(Listener {
            id,
            handler,
            priority: opts.priority,
            owner: opts.owner,
            once,
        });
        // Stable sort: equal priorities stay in insertion order.
        arr.sort_by(|a, b| b.priority.cmp(&a.priority));
        id
    }

    /// Remove one subscription. Empty event records are dropped entirely.
    pub fn off(&self, event: &str, id: SubscriptionId) {
        let mut listeners = self.listeners.lock();
        if let Some(arr) = listeners.get_mut(event) {
            let before = arr.len();
            arr.retain(|l| l.id != id);
            if arr.len() != before {
                self.debug_log(|| format!("off {}", event));
            }
            if arr.is_empty() {
                listeners.remove(event);
            }
        }
    }

    /// Remove every subscription tagged with `owner`, across all events.
    /// Guarantees no dangling listeners survive a module's disable.
    pub fn off_module(&self, owner: &str) {
        if owner.is_empty() {
            return;
        }
        let mut listeners = self.listeners.lock();
        listeners.retain(|event, arr| {
            let before = arr.len();
            arr.retain(|l| l.owner.as_deref() != Some(owner));
            if arr.len() != before {
                self.debug_log(|| format!("off_module {} cleared {}", owner, event));
            }
            !arr.is_empty()
        });
    }

    /// Invoke all current handlers for `event` synchronously, in priority
    /// order. A snapshot of the handler list is taken first, so handlers
    /// added or removed during emission do not affect this pass. A panicking
    /// handler is caught, logged, and does not stop the remaining handlers.
    pub fn emit(&self, event: &str, payload: Payload) {
        let snapshot: Vec<(SubscriptionId, Handler, bool)> = {
            let listeners = self.listeners.lock();
            match listeners.get(event) {
                Some(arr) if !arr.is_empty() => arr
                    .iter()
                    .map(|l| (l.id, Arc::clone(&l.handler), l.once))
                    .collect(),
                _ => return,
            }
        };

        self.debug_log(|| format!("emit {} listeners={}", event, snapshot.len()));

        let mut fired_once: Vec<SubscriptionId> = Vec::new();
        for (id, handler, once) in snapshot {
            if once {
                fired_once.push(id);
            }
            let result = catch_unwind(AssertUnwindSafe(|| handler(&payload)));
            if result.is_err() {
                log::error!("[bus] handler panicked for \"{}\"", event);
            }
        }

        for id in fired_once {
            self.off(event, id);
        }
    }

    /// Emit with a typed payload.
    pub fn emit_value<T: Any + Send + Sync>(&self, event: &str, value: T) {
        self.emit(event, Arc::new(value));
    }

    /// Emit an event that carries no payload.
    pub fn notify(&self, event: &str) {
        self.emit(event, Arc::new(()));
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.listeners.lock().clear();
        self.debug_log(|| "clear all listeners".to_string());
    }

    /// Number of handlers currently registered for `event`.
    pub fn handler_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Downcast a payload to its concrete type.
pub fn downcast<T: Any + Send + Sync>(payload: &Payload) -> Option<&T> {
    payload.downcast_ref::<T>()
}
