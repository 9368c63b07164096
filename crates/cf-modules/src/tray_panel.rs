//! The tray panel module
//!
//! Bus-facing shell around [`cf_panel::PanelController`]: translates the
//! `tray:*` command events into controller calls, mirrors every resulting
//! frame into the scene, and broadcasts `trayPanel:offset` /
//! `trayPanel:closed` / `trayPanel:motion` for the tray to follow.
//!
//! The viewport height comes from the [`VIEWPORT_KEY`] store key published
//! by the host; the panel re-anchors itself when it changes.

use std::sync::Arc;

use parking_lot::Mutex;

use cf_bus::{downcast, SubscribeOpts};
use cf_core::events::{
    topics, OpenPanel, PanelDragEnd, PanelDragMove, PanelMotion, PanelOffset, SetPanelLevel,
};
use cf_core::{CfError, CfResult, NodeId, ParamSpec, ParamValue};
use cf_panel::{PanelController, PanelFrame, PanelParams, PanelTransition};
use cf_registry::{Context, ModuleBuilder, Registry};
use cf_store::StoreSubId;

/// Module key
pub const KEY: &str = "trayPanel";

/// Store key the host publishes the viewport height under, px
pub const VIEWPORT_KEY: &str = "viewport:height";

const DEFAULT_VIEWPORT: f32 = 800.0;

struct PanelNodes {
    overlay: NodeId,
    panel: NodeId,
    content: NodeId,
}

struct PanelShared {
    controller: Mutex<PanelController>,
    nodes: Mutex<Option<PanelNodes>>,
    viewport_sub: Mutex<Option<StoreSubId>>,
}

pub struct PanelState {
    shared: Arc<PanelShared>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            shared: Arc::new(PanelShared {
                controller: Mutex::new(PanelController::new(
                    PanelParams::default(),
                    DEFAULT_VIEWPORT,
                )),
                nodes: Mutex::new(None),
                viewport_sub: Mutex::new(None),
            }),
        }
    }
}

fn inspector() -> Vec<ParamSpec> {
    vec![
        ParamSpec::slider("Level 1 height (%)", "level1", 20.0, 50.0, 1.0, 33.0).hidden(),
        ParamSpec::slider("Level 2 height (%)", "level2", 60.0, 90.0, 1.0, 80.0).hidden(),
        ParamSpec::slider("Animation (ms)", "animDuration", 150.0, 650.0, 25.0, 350.0),
        ParamSpec::slider("Overlay darkness", "overlayDarkness", 0.0, 0.8, 0.05, 0.5),
        ParamSpec::slider("Flick threshold (px/s)", "velocityThreshold", 250.0, 2200.0, 50.0, 800.0)
            .hidden(),
        ParamSpec::slider("Overscroll resistance", "rubberResistance", 0.15, 0.6, 0.05, 0.35)
            .hidden(),
    ]
}

/// Mirror one frame into the scene, then broadcast it. The scene lock is
/// released before the emit so listeners may read the scene freely.
fn publish_frame(ctx: &Context, shared: &PanelShared, frame: &PanelFrame) {
    {
        let nodes = shared.nodes.lock();
        let Some(nodes) = nodes.as_ref() else { return };
        let mut scene = ctx.scene.lock();
        if let Some(v) = scene.visual_mut(nodes.panel) {
            v.translate_y = frame.translate_y;
        }
        if let Some(v) = scene.visual_mut(nodes.overlay) {
            v.opacity = frame.overlay_alpha;
        }
        if let Some(v) = scene.visual_mut(nodes.content) {
            v.height = frame.content_max_height;
        }
    }
    ctx.bus.emit_value(
        topics::TRAY_PANEL_OFFSET,
        PanelOffset {
            offset_px: frame.offset_px,
            level: frame.level,
            dragging: !frame.animate,
        },
    );
}

fn publish_transition(ctx: &Context, shared: &PanelShared, transition: &PanelTransition) {
    publish_frame(ctx, shared, &transition.frame);
    if transition.closed {
        ctx.bus.notify(topics::TRAY_PANEL_CLOSED);
    }
}

fn set_level(ctx: &Context, shared: &PanelShared, level: u8, animate: bool) {
    let transition = {
        let mut controller = shared.controller.lock();
        if animate {
            controller.set_level(level)
        } else {
            controller.set_level_silent(level)
        }
    };
    publish_transition(ctx, shared, &transition);
}

fn open_panel(ctx: &Context, shared: &PanelShared, payload: &OpenPanel) {
    if let Some(mount) = payload.mount.clone() {
        let content = shared.nodes.lock().as_ref().map(|n| n.content);
        if let Some(content) = content {
            shared.controller.lock().set_content(|| mount(content));
        }
    }
    set_level(ctx, shared, 1, true);
}

fn start(state: &mut PanelState, ctx: &Context) -> CfResult<()> {
    let shared = &state.shared;

    let nodes = {
        let mut scene = ctx.scene.lock();
        let overlay = scene.create_node(ctx.container, "panel-overlay");
        let panel = scene.create_node(ctx.container, "tray-panel");
        let content = scene.create_node(panel, "panel-content");
        if let Some(v) = scene.visual_mut(overlay) {
            v.opacity = 0.0;
        }
        PanelNodes {
            overlay,
            panel,
            content,
        }
    };
    *shared.nodes.lock() = Some(nodes);

    // Viewport: initial read plus live re-anchoring.
    let viewport = ctx
        .store
        .get(VIEWPORT_KEY)
        .and_then(|v| v.as_f64())
        .map(|v| v as f32)
        .unwrap_or(DEFAULT_VIEWPORT);
    shared.controller.lock().set_viewport(viewport);

    let sub_shared = Arc::clone(shared);
    let sub_ctx = ctx.clone();
    let sub = ctx.store.subscribe(VIEWPORT_KEY, move |value, _prev| {
        let Some(viewport) = value.as_f64() else { return };
        let level = {
            let mut controller = sub_shared.controller.lock();
            controller.set_viewport(viewport as f32);
            controller.level()
        };
        set_level(&sub_ctx, &sub_shared, level, false);
    });
    *shared.viewport_sub.lock() = Some(sub);

    let anim_duration = shared.controller.lock().params().anim_duration_ms;
    ctx.bus.emit_value(
        topics::TRAY_PANEL_MOTION,
        PanelMotion {
            anim_duration_ms: anim_duration,
        },
    );

    let subscriptions: Vec<(&str, Box<dyn Fn(&cf_bus::Payload) + Send + Sync>)> = vec![
        (topics::TRAY_OPEN_PANEL, {
            let shared = Arc::clone(shared);
            let ctx = ctx.clone();
            Box::new(move |payload: &cf_bus::Payload| {
                match downcast::<OpenPanel>(payload) {
                    Some(open) => open_panel(&ctx, &shared, open),
                    // A bare `openPanel` with no payload still opens.
                    None => set_level(&ctx, &shared, 1, true),
                }
            }) as Box<dyn Fn(&cf_bus::Payload) + Send + Sync>
        }),
        (topics::TRAY_CLOSE_PANEL, {
            let shared = Arc::clone(shared);
            let ctx = ctx.clone();
            Box::new(move |_payload: &cf_bus::Payload| set_level(&ctx, &shared, 0, true))
        }),
        (topics::TRAY_SET_PANEL_LEVEL, {
            let shared = Arc::clone(shared);
            let ctx = ctx.clone();
            Box::new(move |payload: &cf_bus::Payload| {
                if let Some(req) = downcast::<SetPanelLevel>(payload) {
                    set_level(&ctx, &shared, req.level, true);
                }
            })
        }),
        (topics::TRAY_PANEL_DRAG_START, {
            let shared = Arc::clone(shared);
            Box::new(move |_payload: &cf_bus::Payload| shared.controller.lock().drag_start())
        }),
        (topics::TRAY_PANEL_DRAG_MOVE, {
            let shared = Arc::clone(shared);
            let ctx = ctx.clone();
            Box::new(move |payload: &cf_bus::Payload| {
                let Some(mv) = downcast::<PanelDragMove>(payload) else { return };
                let frame = shared.controller.lock().drag_move(mv.dy);
                if let Some(frame) = frame {
                    publish_frame(&ctx, &shared, &frame);
                }
            })
        }),
        (topics::TRAY_PANEL_DRAG_END, {
            let shared = Arc::clone(shared);
            let ctx = ctx.clone();
            Box::new(move |payload: &cf_bus::Payload| {
                let Some(end) = downcast::<PanelDragEnd>(payload) else { return };
                let transition = shared.controller.lock().drag_end(end.vy);
                publish_transition(&ctx, &shared, &transition);
            })
        }),
    ];
    for (event, handler) in subscriptions {
        ctx.bus.on(event, SubscribeOpts::owner(KEY), move |payload| {
            handler(payload)
        });
    }

    // Initial closed position, without animation.
    set_level(ctx, shared, 0, false);
    Ok(())
}

fn disable(state: &mut PanelState, ctx: &Context) -> CfResult<()> {
    let shared = &state.shared;
    shared.controller.lock().clear_content();

    if let Some(sub) = shared.viewport_sub.lock().take() {
        ctx.store.unsubscribe(VIEWPORT_KEY, sub);
    }
    if let Some(nodes) = shared.nodes.lock().take() {
        let mut scene = ctx.scene.lock();
        scene.remove_node(nodes.panel);
        scene.remove_node(nodes.overlay);
    }
    Ok(())
}

fn apply_panel_param(ctx: &Context, shared: &PanelShared, name: &str, value: &ParamValue) {
    let Some(n) = value.as_f64() else { return };
    let mut motion_changed = false;
    {
        let mut controller = shared.controller.lock();
        let params = controller.params_mut();
        match name {
            "level1" => params.level1 = (n / 100.0) as f32,
            "level2" => params.level2 = (n / 100.0) as f32,
            "animDuration" => {
                params.anim_duration_ms = n;
                motion_changed = true;
            }
            "overlayDarkness" => params.overlay_darkness = n as f32,
            "velocityThreshold" => params.velocity_threshold = n as f32,
            "rubberResistance" => params.rubber_resistance = n as f32,
            _ => {}
        }
    }
    if motion_changed {
        ctx.bus.emit_value(
            topics::TRAY_PANEL_MOTION,
            PanelMotion { anim_duration_ms: n },
        );
    }
}

/// Build and register the tray panel module.
pub fn register(registry: &mut Registry) {
    ModuleBuilder::new(KEY, "Tray panel", PanelState::default())
        .inspector(inspector())
        .on_start(|state, args| {
            let Some(ctx) = args.ctx else {
                return Err(CfError::Module("trayPanel started without context".into()));
            };
            for (name, value) in args.params {
                apply_panel_param(ctx, &state.shared, name, value);
            }
            start(state, ctx)
        })
        .on_disable(|state, args| {
            let Some(ctx) = args.ctx else {
                return Ok(());
            };
            disable(state, ctx)
        })
        .on_param(|state, param, value, args| {
            if let Some(ctx) = args.ctx {
                apply_panel_param(ctx, &state.shared, param, value);
            }
            Ok(())
        })
        .register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_bus::EventBus;
    use cf_core::events::PanelCleanup;
    use cf_core::Scene;
    use cf_motion::FrameScheduler;
    use cf_store::Store;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_registry(viewport: f32) -> Registry {
        let scene = Scene::shared();
        let container = scene.lock().root();
        let store = Store::shared();
        store.set(VIEWPORT_KEY, serde_json::json!(viewport));
        let ctx = Context::new(
            container,
            scene,
            EventBus::shared(),
            store,
            FrameScheduler::shared(),
        );
        Registry::new(ctx)
    }

    fn record_offsets(ctx: &Context) -> Arc<Mutex<Vec<PanelOffset>>> {
        let offsets = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&offsets);
        ctx.bus
            .on(topics::TRAY_PANEL_OFFSET, SubscribeOpts::default(), move |p| {
                if let Some(offset) = downcast::<PanelOffset>(p) {
                    sink.lock().push(*offset);
                }
            });
        offsets
    }

    #[test]
    fn test_open_panel_reports_level_one_offset() {
        let mut registry = test_registry(1000.0);
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        let offsets = record_offsets(&ctx);

        ctx.bus
            .emit_value(topics::TRAY_OPEN_PANEL, OpenPanel::default());

        let last = *offsets.lock().last().unwrap();
        assert_eq!(last.level, 1);
        assert!((last.offset_px - 330.0).abs() < 1e-3);
        assert!(!last.dragging);
    }

    #[test]
    fn test_mount_receives_content_node_and_cleanup_runs_on_close() {
        let mut registry = test_registry(1000.0);
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        let cleanups = Arc::new(AtomicU32::new(0));
        let mounted_into = Arc::new(Mutex::new(None::<NodeId>));

        let cleanups2 = Arc::clone(&cleanups);
        let mounted2 = Arc::clone(&mounted_into);
        let mount: cf_core::events::MountFn = Arc::new(move |node| {
            *mounted2.lock() = Some(node);
            let cleanups = Arc::clone(&cleanups2);
            Some(Box::new(move || {
                cleanups.fetch_add(1, Ordering::Relaxed);
            }) as PanelCleanup)
        });

        ctx.bus.emit_value(
            topics::TRAY_OPEN_PANEL,
            OpenPanel { mount: Some(mount) },
        );

        let node = (*mounted_into.lock()).expect("mount was invoked");
        assert_eq!(
            ctx.scene.lock().node(node).unwrap().label,
            "panel-content"
        );
        assert_eq!(cleanups.load(Ordering::Relaxed), 0);

        let closed = {
            let count = Arc::new(Mutex::new(0u32));
            let sink = Arc::clone(&count);
            ctx.bus
                .on(topics::TRAY_PANEL_CLOSED, SubscribeOpts::default(), move |_| {
                    *sink.lock() += 1;
                });
            count
        };

        ctx.bus.notify(topics::TRAY_CLOSE_PANEL);
        assert_eq!(cleanups.load(Ordering::Relaxed), 1);
        assert_eq!(*closed.lock(), 1);
    }

    #[test]
    fn test_drag_protocol_moves_and_snaps() {
        let mut registry = test_registry(1000.0);
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        let offsets = record_offsets(&ctx);

        ctx.bus.notify(topics::TRAY_PANEL_DRAG_START);
        // Finger up 200px: offset 0 → 200, published as a dragging frame.
        ctx.bus
            .emit_value(topics::TRAY_PANEL_DRAG_MOVE, PanelDragMove { dy: -200.0 });
        let mid = *offsets.lock().last().unwrap();
        assert!(mid.dragging);
        assert!((mid.offset_px - 200.0).abs() < 1e-3);

        // Slow release: snaps to the nearest level (1 at 330px).
        ctx.bus
            .emit_value(topics::TRAY_PANEL_DRAG_END, PanelDragEnd { vy: 0.0 });
        let end = *offsets.lock().last().unwrap();
        assert_eq!(end.level, 1);
        assert!((end.offset_px - 330.0).abs() < 1e-3);
    }

    #[test]
    fn test_flick_up_from_level_one_opens_fully() {
        let mut registry = test_registry(1000.0);
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        ctx.bus
            .emit_value(topics::TRAY_SET_PANEL_LEVEL, SetPanelLevel { level: 1 });

        let offsets = record_offsets(&ctx);
        ctx.bus.notify(topics::TRAY_PANEL_DRAG_START);
        ctx.bus
            .emit_value(topics::TRAY_PANEL_DRAG_MOVE, PanelDragMove { dy: -30.0 });
        ctx.bus
            .emit_value(topics::TRAY_PANEL_DRAG_END, PanelDragEnd { vy: -1200.0 });

        let end = *offsets.lock().last().unwrap();
        assert_eq!(end.level, 2);
        assert!((end.offset_px - 800.0).abs() < 1e-3);
    }

    #[test]
    fn test_viewport_change_reanchors_panel() {
        let mut registry = test_registry(1000.0);
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        ctx.bus
            .emit_value(topics::TRAY_SET_PANEL_LEVEL, SetPanelLevel { level: 2 });

        let offsets = record_offsets(&ctx);
        ctx.store.set(VIEWPORT_KEY, serde_json::json!(600.0));

        let last = *offsets.lock().last().unwrap();
        assert_eq!(last.level, 2);
        assert!((last.offset_px - 480.0).abs() < 1e-3);
    }

    #[test]
    fn test_disable_tears_down_nodes_and_store_subscription() {
        let mut registry = test_registry(1000.0);
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        let panel_nodes = ctx.scene.lock().node_count();
        assert!(panel_nodes > 1);

        registry.disable_module(KEY);
        assert_eq!(ctx.scene.lock().node_count(), 1);
        assert_eq!(ctx.bus.handler_count(topics::TRAY_OPEN_PANEL), 0);
        assert_eq!(ctx.store.subscriber_count(VIEWPORT_KEY), 0);
    }
}
