//! CoinForge Event Bus
//!
//! Decoupled, ordered, cancellable publish/subscribe messaging between
//! modules and the core:
//! - Priority-ordered dispatch (higher first, insertion order on ties)
//! - Per-subscriber owner tagging for bulk removal on module disable
//! - `once` subscriptions that self-remove after first delivery
//! - Per-handler panic isolation: one bad listener never breaks emission
//!
//! Payloads are `Arc<dyn Any + Send + Sync>`; the typed payload structs of
//! the public contract live in `cf-core::events`.

mod bus;

pub use bus::{downcast, EventBus, Payload, SubscribeOpts, SubscriptionId};
