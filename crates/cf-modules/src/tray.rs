//! The bottom tray
//!
//! Hosts icon buttons registered over the bus, mirrors the panel's offset
//! so the tray rides on top of the sheet, and translates raw touch input
//! into the panel drag protocol (start/move/end with a release velocity).
//!
//! The tray never talks to the panel module directly: both sides speak
//! only `tray:*`/`trayPanel:*` events, so either can be swapped out.

use std::sync::Arc;

use parking_lot::Mutex;

use cf_bus::{downcast, SubscribeOpts};
use cf_core::events::{
    topics, ButtonPressed, PanelOffset, SetPanelLevel, TouchSample, TrayButtonSpec,
    TrayButtonUpdate,
};
use cf_core::{CfError, CfResult, NodeId, ParamSpec, ParamValue};
use cf_panel::VelocitySampler;
use cf_registry::{Context, ModuleBuilder, Registry};

/// Module key
pub const KEY: &str = "tray";

/// Icon size fallback when a button does not set its own, px
const DEFAULT_ICON_SIZE: f32 = 26.0;

/// Icon opacity for the active / inactive button
const ACTIVE_OPACITY: f32 = 1.0;
const INACTIVE_OPACITY: f32 = 0.8;

#[derive(Debug, Clone)]
struct TrayParams {
    /// Tray height, px
    height: f32,
    /// Gap between the tray and the bottom edge (or the panel top), px
    margin_bottom: f32,
    show_handle: bool,
    /// Finger travel before a touch becomes a drag, px
    drag_threshold: f32,
    velocity_window_ms: f64,
}

impl Default for TrayParams {
    fn default() -> Self {
        Self {
            height: 72.0,
            margin_bottom: 12.0,
            show_handle: true,
            drag_threshold: 5.0,
            velocity_window_ms: 50.0,
        }
    }
}

struct ButtonEntry {
    spec: TrayButtonSpec,
    node: NodeId,
}

struct TrayNodes {
    tray: NodeId,
    handle: NodeId,
    buttons_wrap: NodeId,
}

#[derive(Default)]
struct GestureState {
    touching: bool,
    dragging: bool,
    start_y: f32,
}

struct TrayShared {
    params: Mutex<TrayParams>,
    nodes: Mutex<Option<TrayNodes>>,
    buttons: Mutex<Vec<ButtonEntry>>,
    active_id: Mutex<Option<String>>,
    gesture: Mutex<GestureState>,
    sampler: Mutex<VelocitySampler>,
    panel_offset: Mutex<f32>,
}

pub struct TrayState {
    shared: Arc<TrayShared>,
}

impl Default for TrayState {
    fn default() -> Self {
        let params = TrayParams::default();
        Self {
            shared: Arc::new(TrayShared {
                sampler: Mutex::new(VelocitySampler::new(params.velocity_window_ms)),
                params: Mutex::new(params),
                nodes: Mutex::new(None),
                buttons: Mutex::new(Vec::new()),
                active_id: Mutex::new(None),
                gesture: Mutex::new(GestureState::default()),
                panel_offset: Mutex::new(0.0),
            }),
        }
    }
}

fn inspector() -> Vec<ParamSpec> {
    vec![
        ParamSpec::slider("Tray height (px)", "trayHeight", 48.0, 140.0, 1.0, 72.0),
        ParamSpec::slider("Bottom margin (px)", "marginBottom", 0.0, 40.0, 1.0, 12.0),
        ParamSpec::toggle("Show handle", "showHandle", true),
        ParamSpec::slider("Drag threshold (px)", "dragThreshold", 3.0, 20.0, 1.0, 5.0).hidden(),
        ParamSpec::slider("Velocity window (ms)", "velocityWindowMs", 40.0, 180.0, 10.0, 50.0)
            .hidden(),
    ]
}

fn apply_tray_param(shared: &TrayShared, name: &str, value: &ParamValue) {
    let mut params = shared.params.lock();
    match name {
        "trayHeight" => {
            if let Some(n) = value.as_f64() {
                params.height = n as f32;
            }
        }
        "marginBottom" => {
            if let Some(n) = value.as_f64() {
                params.margin_bottom = n as f32;
            }
        }
        "showHandle" => {
            if let Some(b) = value.as_bool() {
                params.show_handle = b;
            }
        }
        "dragThreshold" => {
            if let Some(n) = value.as_f64() {
                params.drag_threshold = n as f32;
            }
        }
        "velocityWindowMs" => {
            if let Some(n) = value.as_f64() {
                params.velocity_window_ms = n;
                shared.sampler.lock().set_window(n);
            }
        }
        _ => {}
    }
}

/// Reposition and restyle the tray from the current params + panel offset.
fn apply_visuals(ctx: &Context, shared: &TrayShared) {
    let nodes = shared.nodes.lock();
    let Some(nodes) = nodes.as_ref() else { return };
    let params = shared.params.lock();
    let offset = *shared.panel_offset.lock();

    let mut scene = ctx.scene.lock();
    if let Some(v) = scene.visual_mut(nodes.tray) {
        v.height = params.height;
        // The tray rides on the panel: negative = lifted off the bottom.
        v.translate_y = -(offset + params.margin_bottom);
    }
    if let Some(v) = scene.visual_mut(nodes.handle) {
        v.opacity = if params.show_handle { 0.9 } else { 0.0 };
    }
}

fn register_button(ctx: &Context, shared: &TrayShared, spec: &TrayButtonSpec) {
    if spec.id.is_empty() {
        log::warn!("[tray] registerButton: missing id");
        return;
    }
    let mut buttons = shared.buttons.lock();
    if buttons.iter().any(|b| b.spec.id == spec.id) {
        return;
    }
    let nodes = shared.nodes.lock();
    let Some(nodes) = nodes.as_ref() else { return };

    let node = {
        let mut scene = ctx.scene.lock();
        let node = scene.create_node(nodes.buttons_wrap, &format!("tray-button-{}", spec.id));
        if let Some(v) = scene.visual_mut(node) {
            let size = spec.icon_size.unwrap_or(DEFAULT_ICON_SIZE);
            v.width = size;
            v.height = size;
            v.opacity = INACTIVE_OPACITY;
        }
        node
    };

    buttons.push(ButtonEntry {
        spec: spec.clone(),
        node,
    });
    buttons.sort_by_key(|b| b.spec.order);

    log::debug!("[tray] button registered: {}", spec.id);
}

fn update_button(ctx: &Context, shared: &TrayShared, update: &TrayButtonUpdate) {
    let buttons = shared.buttons.lock();
    let Some(entry) = buttons.iter().find(|b| b.spec.id == update.id) else {
        return;
    };
    let mut scene = ctx.scene.lock();
    if let Some(v) = scene.visual_mut(entry.node) {
        v.width = update.icon_size;
        v.height = update.icon_size;
    }
}

/// Reflect the active id onto the button nodes.
fn apply_active(ctx: &Context, shared: &TrayShared) {
    let active = shared.active_id.lock().clone();
    let buttons = shared.buttons.lock();
    let mut scene = ctx.scene.lock();
    for entry in buttons.iter() {
        if let Some(v) = scene.visual_mut(entry.node) {
            v.opacity = if active.as_deref() == Some(entry.spec.id.as_str()) {
                ACTIVE_OPACITY
            } else {
                INACTIVE_OPACITY
            };
        }
    }
}

/// A tap on a registered button: mark it active, open the panel at level 1
/// and run the button's own callback.
fn on_button_pressed(ctx: &Context, shared: &TrayShared, id: &str) {
    if shared.gesture.lock().dragging {
        return;
    }
    let on_click = {
        let buttons = shared.buttons.lock();
        let Some(entry) = buttons.iter().find(|b| b.spec.id == id) else {
            log::warn!("[tray] pressed unknown button: {}", id);
            return;
        };
        entry.spec.on_click.clone()
    };

    *shared.active_id.lock() = Some(id.to_string());
    apply_active(ctx, shared);
    ctx.bus
        .emit_value(topics::TRAY_SET_PANEL_LEVEL, SetPanelLevel { level: 1 });
    ctx.bus.emit_value(
        topics::TRAY_OPEN_PANEL,
        cf_core::events::OpenPanel::default(),
    );
    if let Some(on_click) = on_click {
        on_click();
    }
}

fn deactivate(ctx: &Context, shared: &TrayShared) {
    *shared.active_id.lock() = None;
    apply_active(ctx, shared);
}

fn on_touch_start(ctx: &Context, shared: &TrayShared, sample: &TouchSample) {
    {
        let mut gesture = shared.gesture.lock();
        gesture.touching = true;
        gesture.dragging = false;
        gesture.start_y = sample.y;
    }
    let mut sampler = shared.sampler.lock();
    sampler.reset();
    sampler.record(sample.t_ms, sample.y);
    ctx.bus.notify(topics::TRAY_PANEL_DRAG_START);
}

fn on_touch_move(ctx: &Context, shared: &TrayShared, sample: &TouchSample) {
    let dy = {
        let mut gesture = shared.gesture.lock();
        if !gesture.touching {
            return;
        }
        shared.sampler.lock().record(sample.t_ms, sample.y);

        let travelled = sample.y - gesture.start_y;
        if !gesture.dragging {
            let threshold = shared.params.lock().drag_threshold;
            if travelled.abs() < threshold {
                return;
            }
            gesture.dragging = true;
        }
        // Incremental delta: start_y trails the finger.
        gesture.start_y = sample.y;
        travelled
    };
    ctx.bus.emit_value(
        topics::TRAY_PANEL_DRAG_MOVE,
        cf_core::events::PanelDragMove { dy },
    );
}

fn on_touch_end(ctx: &Context, shared: &TrayShared) {
    let was_dragging = {
        let mut gesture = shared.gesture.lock();
        if !gesture.touching {
            return;
        }
        gesture.touching = false;
        std::mem::take(&mut gesture.dragging)
    };

    let vy = shared.sampler.lock().velocity();
    shared.sampler.lock().reset();

    // A touch that never crossed the threshold is a tap, not a drag.
    if was_dragging {
        ctx.bus
            .emit_value(topics::TRAY_PANEL_DRAG_END, cf_core::events::PanelDragEnd { vy });
    }
}

fn start(state: &mut TrayState, ctx: &Context) -> CfResult<()> {
    let shared = &state.shared;

    let nodes = {
        let mut scene = ctx.scene.lock();
        let tray = scene.create_node(ctx.container, "tray");
        let handle = scene.create_node(tray, "tray-handle");
        let buttons_wrap = scene.create_node(tray, "tray-buttons");
        TrayNodes {
            tray,
            handle,
            buttons_wrap,
        }
    };
    *shared.nodes.lock() = Some(nodes);
    apply_visuals(ctx, shared);

    let subscriptions: Vec<(&str, Box<dyn Fn(&cf_bus::Payload) + Send + Sync>)> = {
        let s = |shared: &Arc<TrayShared>| Arc::clone(shared);

        vec![
            (topics::TRAY_PANEL_OFFSET, {
                let shared = s(shared);
                let ctx = ctx.clone();
                Box::new(move |payload: &cf_bus::Payload| {
                    let Some(offset) = downcast::<PanelOffset>(payload) else { return };
                    *shared.panel_offset.lock() = offset.offset_px;
                    apply_visuals(&ctx, &shared);
                    if offset.level == 0 {
                        deactivate(&ctx, &shared);
                    }
                }) as Box<dyn Fn(&cf_bus::Payload) + Send + Sync>
            }),
            (topics::TRAY_PANEL_CLOSED, {
                let shared = s(shared);
                let ctx = ctx.clone();
                Box::new(move |_payload: &cf_bus::Payload| deactivate(&ctx, &shared))
            }),
            (topics::TRAY_REGISTER_BUTTON, {
                let shared = s(shared);
                let ctx = ctx.clone();
                Box::new(move |payload: &cf_bus::Payload| {
                    if let Some(spec) = downcast::<TrayButtonSpec>(payload) {
                        register_button(&ctx, &shared, spec);
                    }
                })
            }),
            (topics::TRAY_UPDATE_BUTTON, {
                let shared = s(shared);
                let ctx = ctx.clone();
                Box::new(move |payload: &cf_bus::Payload| {
                    if let Some(update) = downcast::<TrayButtonUpdate>(payload) {
                        update_button(&ctx, &shared, update);
                    }
                })
            }),
            (topics::TRAY_BUTTON_PRESSED, {
                let shared = s(shared);
                let ctx = ctx.clone();
                Box::new(move |payload: &cf_bus::Payload| {
                    if let Some(pressed) = downcast::<ButtonPressed>(payload) {
                        on_button_pressed(&ctx, &shared, &pressed.id);
                    }
                })
            }),
            (topics::INPUT_TOUCH_START, {
                let shared = s(shared);
                let ctx = ctx.clone();
                Box::new(move |payload: &cf_bus::Payload| {
                    if let Some(sample) = downcast::<TouchSample>(payload) {
                        on_touch_start(&ctx, &shared, sample);
                    }
                })
            }),
            (topics::INPUT_TOUCH_MOVE, {
                let shared = s(shared);
                let ctx = ctx.clone();
                Box::new(move |payload: &cf_bus::Payload| {
                    if let Some(sample) = downcast::<TouchSample>(payload) {
                        on_touch_move(&ctx, &shared, sample);
                    }
                })
            }),
            (topics::INPUT_TOUCH_END, {
                let shared = s(shared);
                let ctx = ctx.clone();
                Box::new(move |_payload: &cf_bus::Payload| on_touch_end(&ctx, &shared))
            }),
        ]
    };
    for (event, handler) in subscriptions {
        ctx.bus.on(event, SubscribeOpts::owner(KEY), move |payload| {
            handler(payload)
        });
    }

    Ok(())
}

fn disable(state: &mut TrayState, ctx: &Context) -> CfResult<()> {
    let shared = &state.shared;
    shared.buttons.lock().clear();
    *shared.active_id.lock() = None;
    *shared.gesture.lock() = GestureState::default();
    shared.sampler.lock().reset();

    if let Some(nodes) = shared.nodes.lock().take() {
        ctx.scene.lock().remove_node(nodes.tray);
    }
    Ok(())
}

/// Build and register the tray module.
pub fn register(registry: &mut Registry) {
    ModuleBuilder::new(KEY, "Bottom tray", TrayState::default())
        .inspector(inspector())
        .on_start(|state, args| {
            let Some(ctx) = args.ctx else {
                return Err(CfError::Module("tray started without context".into()));
            };
            for (name, value) in args.params {
                apply_tray_param(&state.shared, name, value);
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
            apply_tray_param(&state.shared, param, value);
            if let Some(ctx) = args.ctx {
                apply_visuals(ctx, &state.shared);
            }
            Ok(())
        })
        .register(registry);
}
