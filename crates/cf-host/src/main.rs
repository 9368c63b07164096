//! CoinForge headless host
//!
//! Boots the full module stack against an in-process scene and drives a
//! scripted session: register a tray button, flip the coin, swipe the
//! panel open and closed. A real frontend replaces the scripted input
//! with live events and reads the scene back every frame; everything
//! below the input layer is identical.

use std::sync::Arc;

use parking_lot::Mutex;

use cf_bus::{downcast, EventBus, SubscribeOpts};
use cf_core::events::{topics, ButtonPressed, SpinEnd, TouchSample, TrayButtonSpec};
use cf_core::Scene;
use cf_inspector::{FileSettings, Inspector};
use cf_modules::{register_builtin_modules, tray_panel};
use cf_motion::FrameScheduler;
use cf_registry::{Context, Registry};
use cf_store::Store;

/// Simulated viewport height, px
const VIEWPORT_PX: f64 = 960.0;

/// Simulated frame cadence, ms
const FRAME_MS: f64 = 1000.0 / 60.0;

struct Session {
    registry: Registry,
    ctx: Context,
    now_ms: f64,
}

impl Session {
    fn boot() -> Self {
        let scene = Scene::shared();
        let container = scene.lock().root();
        let store = Store::shared();
        store.set(tray_panel::VIEWPORT_KEY, serde_json::json!(VIEWPORT_PX));

        let ctx = Context::new(
            container,
            scene,
            EventBus::shared(),
            store,
            FrameScheduler::shared(),
        );
        let mut registry = Registry::new(ctx.clone());
        register_builtin_modules(&mut registry);

        let inspector = Inspector::new(Box::new(FileSettings::default()));
        inspector.apply_stored(&mut registry);

        Self {
            registry,
            ctx,
            now_ms: 0.0,
        }
    }

    /// Advance the simulated clock by `seconds` of frames.
    fn run(&mut self, seconds: f64) {
        let frames = (seconds * 1000.0 / FRAME_MS).ceil() as usize;
        for _ in 0..frames {
            self.ctx.frames.tick(self.now_ms);
            self.now_ms += FRAME_MS;
        }
    }
}

fn main() {
    env_logger::init();
    log::info!("Starting CoinForge host...");

    let mut session = Session::boot();
    let ctx = session.ctx.clone();

    let results: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    ctx.bus
        .on(topics::COIN_SPIN_END, SubscribeOpts::default(), move |p| {
            if let Some(end) = downcast::<SpinEnd>(p) {
                sink.lock().push(end.side.as_str().to_string());
            }
        });

    ctx.bus.emit_value(
        topics::TRAY_REGISTER_BUTTON,
        TrayButtonSpec {
            id: "settings".to_string(),
            order: 0,
            icon: "gear".to_string(),
            icon_size: None,
            on_click: None,
        },
    );

    // Let the idle spin settle in, then flip.
    session.run(0.5);
    log::info!("Pressing the coin");
    session.ctx.bus.notify(topics::COIN_PRESS);
    session.run(8.0);

    // Open the panel through the button, then swipe it shut.
    log::info!("Opening the tray panel");
    session.ctx.bus.emit_value(
        topics::TRAY_BUTTON_PRESSED,
        ButtonPressed {
            id: "settings".to_string(),
        },
    );
    session.run(0.5);

    log::info!("Swiping the panel closed");
    let t = session.now_ms;
    let bus = &session.ctx.bus;
    bus.emit_value(topics::INPUT_TOUCH_START, TouchSample { t_ms: t, y: 500.0 });
    bus.emit_value(
        topics::INPUT_TOUCH_MOVE,
        TouchSample {
            t_ms: t + 20.0,
            y: 560.0,
        },
    );
    bus.emit_value(
        topics::INPUT_TOUCH_END,
        TouchSample {
            t_ms: t + 40.0,
            y: 620.0,
        },
    );
    session.run(0.5);

    let registry = &session.registry;
    for section in Inspector::new(Box::new(FileSettings::default())).sections(registry) {
        log::info!(
            "module {} ({}) enabled={} controls={}",
            section.key,
            section.name,
            section.enabled,
            section.controls.len()
        );
    }

    let results = results.lock();
    match results.as_slice() {
        [] => log::warn!("session ended without a settled flip"),
        sides => log::info!("flip results: {}", sides.join(", ")),
    }
    log::info!(
        "session over: {:.1}s simulated, {} scene nodes",
        session.now_ms / 1000.0,
        session.ctx.scene.lock().node_count()
    );
}
