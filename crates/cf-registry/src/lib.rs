//! CoinForge Module Registry / Lifecycle Core
//!
//! Central authority over which modules exist, their dependency order, and
//! their enabled/disabled state. The single integration point between the
//! bus, the store, the scene, and per-module lifecycle hooks.
//!
//! Per-module state machine:
//! Unregistered → Registered(disabled) → Enabled → Disabled → Enabled → …
//! No destroyed state is reachable at runtime.
//!
//! Modules communicate only through bus events and store keys, never by
//! direct reference; the shared [`Context`] carries the handles each
//! module is allowed to touch.

mod context;
mod factory;
mod module;
mod registry;

pub use context::Context;
pub use factory::{BuiltModule, HookArgs, ModuleBuilder};
pub use module::Module;
pub use registry::{ModuleSnapshot, Registry};
