//! The coin module
//!
//! Builds the coin's scene nodes, runs the continuous rotation loop, and
//! drives one cancellable flip sequence per `coin:press`. The wrap node is
//! published under the [`WRAP_NODE_KEY`] store key so dependent modules
//! (effects) can attach to it without touching this module directly.
//!
//! Retrigger behavior: a press during a running flip supersedes it. The
//! stale sequence halts at its next frame without emitting `coin:spinEnd`,
//! so listeners see exactly one spin end per completed flip.

use std::sync::Arc;

use parking_lot::Mutex;

use cf_core::events::{topics, SpinEnd};
use cf_core::{CfError, CfResult, NodeId, ParamBag, ParamSpec, ParamValue};
use cf_motion::{face_visuals, CoinMotion, CoinParams, FlipRun, FlipStep, TaskId, TokenSlot};
use cf_registry::{Context, ModuleBuilder, Registry};

/// Store key under which the coin publishes its wrap node
pub const WRAP_NODE_KEY: &str = "coin:wrapNode";

/// Module key
pub const KEY: &str = "coin";

struct CoinNodes {
    layer: NodeId,
    wrap: NodeId,
    avers: NodeId,
    revers: NodeId,
    edge: NodeId,
}

struct CoinShared {
    params: Mutex<CoinParams>,
    motion: Mutex<CoinMotion>,
    slot: TokenSlot,
    nodes: Mutex<Option<CoinNodes>>,
    render_task: Mutex<Option<TaskId>>,
}

/// Builder state: one shared block reachable from bus handlers and frame
/// tasks alike.
pub struct CoinState {
    shared: Arc<CoinShared>,
}

impl Default for CoinState {
    fn default() -> Self {
        let params = CoinParams::default();
        Self {
            shared: Arc::new(CoinShared {
                motion: Mutex::new(CoinMotion::new(params.base_speed)),
                params: Mutex::new(params),
                slot: TokenSlot::new(),
                nodes: Mutex::new(None),
                render_task: Mutex::new(None),
            }),
        }
    }
}

fn inspector() -> Vec<ParamSpec> {
    vec![
        ParamSpec::slider("Coin size (px)", "coinSize", 100.0, 250.0, 1.0, 170.0),
        ParamSpec::slider("Idle spin speed", "baseSpeed", 40.0, 300.0, 1.0, 75.0),
        ParamSpec::slider("Jump height (px)", "jumpHeight", 30.0, 300.0, 1.0, 60.0),
        ParamSpec::slider("Jump duration (s)", "jumpDuration", 0.05, 0.3, 0.01, 0.2),
        ParamSpec::slider("Boost duration (s)", "spinDuration", 0.1, 2.5, 0.05, 1.2),
        ParamSpec::slider("Boost speed", "boostSpeed", 800.0, 2400.0, 50.0, 1600.0),
        ParamSpec::slider("Slowdown turns", "extraRotations", 1.0, 10.0, 0.5, 2.5),
        ParamSpec::slider("Pause before return (s)", "pauseDuration", 0.2, 1.0, 0.05, 0.5),
        ParamSpec::slider("Avers chance (%)", "headsChance", 0.0, 100.0, 1.0, 50.0),
        ParamSpec::slider("Edge band", "edgeWidth", 0.02, 0.3, 0.01, 0.1).hidden(),
    ]
}

/// Map one inspector param onto the motion params.
fn apply_coin_param(params: &mut CoinParams, name: &str, value: &ParamValue) {
    let Some(n) = value.as_f64() else { return };
    let f = n as f32;
    match name {
        "coinSize" => params.coin_size = f,
        "baseSpeed" => params.base_speed = f,
        "jumpHeight" => params.jump_height = f,
        "jumpDuration" => params.jump_duration = f,
        "spinDuration" => params.spin_duration = f,
        "boostSpeed" => params.boost_speed = f,
        "extraRotations" => params.extra_rotations = f,
        "pauseDuration" => params.pause_duration = f,
        "headsChance" => params.heads_chance = n / 100.0,
        "edgeWidth" => params.edge_width = f,
        _ => {}
    }
}

fn sync_params(params: &mut CoinParams, bag: &ParamBag) {
    for (name, value) in bag {
        apply_coin_param(params, name, value);
    }
}

fn build_nodes(ctx: &Context, shared: &CoinShared) -> CoinNodes {
    let size = shared.params.lock().coin_size;
    let mut scene = ctx.scene.lock();

    let layer = scene.create_node(ctx.container, "coin-layer");
    let wrap = scene.create_node(layer, "coin-wrap");
    let avers = scene.create_node(wrap, "coin-avers");
    let revers = scene.create_node(wrap, "coin-revers");
    let edge = scene.create_node(wrap, "coin-edge");

    for id in [wrap, avers, revers, edge] {
        if let Some(v) = scene.visual_mut(id) {
            v.width = size;
            v.height = size;
        }
    }
    // Only the decided face is visible at rest.
    if let Some(v) = scene.visual_mut(revers) {
        v.opacity = 0.0;
    }
    if let Some(v) = scene.visual_mut(edge) {
        v.opacity = 0.0;
    }

    CoinNodes {
        layer,
        wrap,
        avers,
        revers,
        edge,
    }
}

fn resize_nodes(ctx: &Context, shared: &CoinShared) {
    let size = shared.params.lock().coin_size;
    let nodes = shared.nodes.lock();
    let Some(nodes) = nodes.as_ref() else { return };
    let mut scene = ctx.scene.lock();
    for id in [nodes.wrap, nodes.avers, nodes.revers, nodes.edge] {
        if let Some(v) = scene.visual_mut(id) {
            v.width = size;
            v.height = size;
        }
    }
}

/// Write the current motion state into the scene. No-op after teardown.
fn render(ctx: &Context, shared: &CoinShared) {
    let nodes = shared.nodes.lock();
    let Some(nodes) = nodes.as_ref() else { return };

    let (angle, lift_y) = {
        let motion = shared.motion.lock();
        (motion.angle, motion.lift_y)
    };
    let edge_width = shared.params.lock().edge_width;
    let face = face_visuals(angle, edge_width);

    let mut scene = ctx.scene.lock();
    if let Some(v) = scene.visual_mut(nodes.wrap) {
        v.scale_x = face.scale_x;
        v.translate_y = lift_y;
    }
    if let Some(v) = scene.visual_mut(nodes.avers) {
        v.opacity = face.avers_opacity;
    }
    if let Some(v) = scene.visual_mut(nodes.revers) {
        v.opacity = face.revers_opacity;
    }
    if let Some(v) = scene.visual_mut(nodes.edge) {
        v.opacity = face.edge_opacity;
    }
}

/// Handle one `coin:press`: supersede any running flip and spawn a frame
/// task stepping the fresh sequence.
fn on_press(ctx: &Context, shared: &Arc<CoinShared>) {
    ctx.bus.notify(topics::COIN_SPIN_START);

    let run = {
        let params = shared.params.lock();
        let mut motion = shared.motion.lock();
        FlipRun::begin(&shared.slot, &params, &mut motion, rand::random::<f64>())
    };

    let frames = Arc::clone(&ctx.frames);
    let shared = Arc::clone(shared);
    let ctx = ctx.clone();
    let mut run = run;
    frames.spawn(move |tick| {
        let step = {
            let params = shared.params.lock();
            let mut motion = shared.motion.lock();
            run.step(tick.dt, &mut motion, &params, &shared.slot)
        };
        match step {
            FlipStep::Continue => cf_motion::TaskStatus::Running,
            FlipStep::Settled(side) => {
                log::info!("[coin] settled: {}", side.as_str());
                ctx.bus.emit_value(topics::COIN_SPIN_END, SpinEnd { side });
                cf_motion::TaskStatus::Running
            }
            FlipStep::Done | FlipStep::Halted => cf_motion::TaskStatus::Done,
        }
    });
}

fn start(state: &mut CoinState, ctx: &Context, bag: &ParamBag) -> CfResult<()> {
    let shared = &state.shared;
    {
        let mut params = shared.params.lock();
        sync_params(&mut params, bag);
        shared.motion.lock().reset(params.base_speed);
    }

    let nodes = build_nodes(ctx, shared);
    let wrap = nodes.wrap;
    *shared.nodes.lock() = Some(nodes);
    ctx.store.set(WRAP_NODE_KEY, serde_json::to_value(wrap)?);

    // Continuous rotation loop: runs for the lifetime of the module, idles
    // toward the base speed whenever no flip is in flight.
    let loop_shared = Arc::clone(shared);
    let loop_ctx = ctx.clone();
    let task = ctx.frames.spawn(move |tick| {
        if loop_shared.nodes.lock().is_none() {
            return cf_motion::TaskStatus::Done;
        }
        {
            let params = loop_shared.params.lock();
            let mut motion = loop_shared.motion.lock();
            let idle = !loop_shared.slot.has_active();
            motion.advance(tick.dt, idle, params.base_speed);
        }
        render(&loop_ctx, &loop_shared);
        cf_motion::TaskStatus::Running
    });
    *shared.render_task.lock() = Some(task);

    let press_shared = Arc::clone(shared);
    let press_ctx = ctx.clone();
    ctx.bus.on(
        topics::COIN_PRESS,
        cf_bus::SubscribeOpts::owner(KEY),
        move |_payload| on_press(&press_ctx, &press_shared),
    );

    Ok(())
}

fn disable(state: &mut CoinState, ctx: &Context) -> CfResult<()> {
    let shared = &state.shared;
    shared.slot.cancel_active();

    if let Some(task) = shared.render_task.lock().take() {
        ctx.frames.cancel(task);
    }
    if let Some(nodes) = shared.nodes.lock().take() {
        ctx.scene.lock().remove_node(nodes.layer);
    }
    ctx.store.set(WRAP_NODE_KEY, serde_json::Value::Null);
    Ok(())
}

/// Build and register the coin module.
pub fn register(registry: &mut Registry) {
    ModuleBuilder::new(KEY, "Coin", CoinState::default())
        .inspector(inspector())
        .on_start(|state, args| {
            let Some(ctx) = args.ctx else {
                return Err(CfError::Module("coin started without context".into()));
            };
            start(state, ctx, args.params)
        })
        .on_disable(|state, args| {
            let Some(ctx) = args.ctx else {
                return Ok(());
            };
            disable(state, ctx)
        })
        .on_param(|state, param, value, args| {
            {
                let mut params = state.shared.params.lock();
                apply_coin_param(&mut params, param, value);
            }
            if param == "coinSize" {
                if let Some(ctx) = args.ctx {
                    resize_nodes(ctx, &state.shared);
                }
            }
            Ok(())
        })
        .register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_bus::{downcast, EventBus};
    use cf_core::{Scene, Side};
    use cf_motion::FrameScheduler;
    use cf_store::Store;

    fn test_registry() -> Registry {
        let scene = Scene::shared();
        let container = scene.lock().root();
        let ctx = Context::new(
            container,
            scene,
            EventBus::shared(),
            Store::shared(),
            FrameScheduler::shared(),
        );
        Registry::new(ctx)
    }

    fn fast_flip_params(registry: &mut Registry) {
        registry.apply_param(KEY, "jumpDuration", ParamValue::Number(0.05));
        registry.apply_param(KEY, "spinDuration", ParamValue::Number(0.1));
        registry.apply_param(KEY, "pauseDuration", ParamValue::Number(0.2));
    }

    fn collect_spin_ends(ctx: &Context) -> Arc<Mutex<Vec<Side>>> {
        let ends = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ends);
        ctx.bus.on(
            topics::COIN_SPIN_END,
            cf_bus::SubscribeOpts::default(),
            move |payload| {
                if let Some(end) = downcast::<SpinEnd>(payload) {
                    sink.lock().push(end.side);
                }
            },
        );
        ends
    }

    fn run_frames(ctx: &Context, from_ms: f64, count: usize) -> f64 {
        let mut now = from_ms;
        for _ in 0..count {
            ctx.frames.tick(now);
            now += 20.0;
        }
        now
    }

    #[test]
    fn test_enable_publishes_wrap_node_and_spins() {
        let mut registry = test_registry();
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        let wrap: NodeId =
            serde_json::from_value(ctx.store.get(WRAP_NODE_KEY).unwrap()).unwrap();
        assert!(ctx.scene.lock().contains(wrap));

        run_frames(&ctx, 0.0, 10);
        // The idle loop rotated the coin away from zero.
        let scale = ctx.scene.lock().visual(wrap).unwrap().scale_x;
        assert!(scale > 0.0 && scale <= 1.0);
    }

    #[test]
    fn test_press_emits_exactly_one_spin_end() {
        let mut registry = test_registry();
        register(&mut registry);
        registry.enable_module(KEY);
        fast_flip_params(&mut registry);

        let ctx = registry.context().clone();
        let ends = collect_spin_ends(&ctx);

        ctx.frames.tick(0.0);
        ctx.bus.notify(topics::COIN_PRESS);
        run_frames(&ctx, 20.0, 600);

        assert_eq!(ends.lock().len(), 1);
    }

    #[test]
    fn test_retrigger_yields_one_spin_end_total() {
        let mut registry = test_registry();
        register(&mut registry);
        registry.enable_module(KEY);
        fast_flip_params(&mut registry);

        let ctx = registry.context().clone();
        let ends = collect_spin_ends(&ctx);

        ctx.frames.tick(0.0);
        ctx.bus.notify(topics::COIN_PRESS);
        // A few frames in, press again: the first run must halt silently.
        let now = run_frames(&ctx, 20.0, 5);
        ctx.bus.notify(topics::COIN_PRESS);
        run_frames(&ctx, now, 600);

        assert_eq!(ends.lock().len(), 1);
    }

    #[test]
    fn test_disable_tears_down_nodes_and_tasks() {
        let mut registry = test_registry();
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        ctx.frames.tick(0.0);
        ctx.bus.notify(topics::COIN_PRESS);
        ctx.frames.tick(20.0);

        let wrap: NodeId =
            serde_json::from_value(ctx.store.get(WRAP_NODE_KEY).unwrap()).unwrap();
        registry.disable_module(KEY);

        assert!(!ctx.scene.lock().contains(wrap));
        assert_eq!(ctx.store.get(WRAP_NODE_KEY), Some(serde_json::Value::Null));

        // Remaining tasks drain themselves once the nodes are gone.
        run_frames(&ctx, 40.0, 3);
        assert_eq!(ctx.frames.task_count(), 0);

        // A press after disable does nothing (the subscription is gone).
        ctx.bus.notify(topics::COIN_PRESS);
        assert_eq!(ctx.bus.handler_count(topics::COIN_PRESS), 0);
    }

    #[test]
    fn test_coin_size_param_resizes_nodes() {
        let mut registry = test_registry();
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        registry.apply_param(KEY, "coinSize", ParamValue::Number(200.0));

        let wrap: NodeId =
            serde_json::from_value(ctx.store.get(WRAP_NODE_KEY).unwrap()).unwrap();
        assert_eq!(ctx.scene.lock().visual(wrap).unwrap().width, 200.0);
    }

    #[test]
    fn test_heads_chance_extremes() {
        for (chance, expected) in [(100.0, Side::Avers), (0.0, Side::Revers)] {
            let mut registry = test_registry();
            register(&mut registry);
            registry.enable_module(KEY);
            fast_flip_params(&mut registry);
            registry.apply_param(KEY, "headsChance", ParamValue::Number(chance));

            let ctx = registry.context().clone();
            let ends = collect_spin_ends(&ctx);

            ctx.frames.tick(0.0);
            ctx.bus.notify(topics::COIN_PRESS);
            run_frames(&ctx, 20.0, 600);

            assert_eq!(*ends.lock(), vec![expected]);
        }
    }
}
