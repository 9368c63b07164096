//! CoinForge Built-in Modules
//!
//! The four modules the default application registers: the coin itself,
//! its landing glow, the bottom tray, and the tray's sliding panel. Each
//! is assembled with [`cf_registry::ModuleBuilder`] and communicates with
//! the others exclusively over bus events and store keys.
//!
//! Module keys:
//! - `coin` — the flipping coin
//! - `coinEffects` — glow pulse on spin end (depends on `coin`)
//! - `tray` — bottom icon tray and gesture translation
//! - `trayPanel` — the draggable bottom sheet

pub mod coin;
pub mod coin_effects;
pub mod tray;
pub mod tray_panel;

use cf_registry::Registry;

/// Register the default module set. Nothing is enabled yet; callers decide
/// which modules to bring up (usually all of them, via the inspector's
/// persisted `enabled::*` entries).
pub fn register_builtin_modules(registry: &mut Registry) {
    coin::register(registry);
    coin_effects::register(registry);
    tray::register(registry);
    tray_panel::register(registry);
}
