//! Coin glow effect
//!
//! Independent of the coin module's internals: it finds the wrap node
//! through the [`crate::coin::WRAP_NODE_KEY`] store key, parks a glow node
//! behind the coin, and pulses it on every `coin:spinEnd`. Declares a
//! dependency on `coin` so the wrap exists before this module starts.

use std::sync::Arc;

use parking_lot::Mutex;

use cf_core::events::topics;
use cf_core::{CfError, CfResult, NodeId, ParamSpec, ParamValue};
use cf_motion::{animate_over, TokenSlot};
use cf_registry::{Context, ModuleBuilder, Registry};

/// Module key
pub const KEY: &str = "coinEffects";

/// Glow node base diameter before the size percentage applies, px
const GLOW_BASE_SIZE: f32 = 260.0;

#[derive(Debug, Clone)]
struct GlowParams {
    color: String,
    /// Full pulse duration, seconds
    duration: f32,
    /// Peak opacity, percent
    strength: f32,
    /// Peak diameter relative to the base, percent
    size: f32,
}

impl Default for GlowParams {
    fn default() -> Self {
        Self {
            color: "#ffdd88".to_string(),
            duration: 1.2,
            strength: 140.0,
            size: 150.0,
        }
    }
}

struct EffectShared {
    params: Mutex<GlowParams>,
    glow: Mutex<Option<NodeId>>,
    slot: TokenSlot,
}

pub struct EffectState {
    shared: Arc<EffectShared>,
}

impl Default for EffectState {
    fn default() -> Self {
        Self {
            shared: Arc::new(EffectShared {
                params: Mutex::new(GlowParams::default()),
                glow: Mutex::new(None),
                slot: TokenSlot::new(),
            }),
        }
    }
}

fn inspector() -> Vec<ParamSpec> {
    vec![
        ParamSpec::color("Glow color", "glowColor", "#ffdd88"),
        ParamSpec::slider("Duration (s)", "glowDuration", 0.2, 3.0, 0.1, 1.2),
        ParamSpec::slider("Strength (%)", "glowStrength", 10.0, 300.0, 5.0, 140.0),
        ParamSpec::slider("Size (%)", "glowSize", 110.0, 250.0, 5.0, 150.0),
    ]
}

fn apply_glow_param(params: &mut GlowParams, name: &str, value: &ParamValue) {
    match name {
        "glowColor" => {
            if let Some(s) = value.as_str() {
                params.color = s.to_string();
            }
        }
        "glowDuration" => {
            if let Some(n) = value.as_f64() {
                params.duration = n as f32;
            }
        }
        "glowStrength" => {
            if let Some(n) = value.as_f64() {
                params.strength = n as f32;
            }
        }
        "glowSize" => {
            if let Some(n) = value.as_f64() {
                params.size = n as f32;
            }
        }
        _ => {}
    }
}

/// One pulse: rise over the first 40% of the duration, fade over the rest.
/// A new pulse supersedes a running one through the token slot.
fn run_glow(ctx: &Context, shared: &Arc<EffectShared>) {
    let Some(glow) = *shared.glow.lock() else { return };
    let (duration, strength, size, color) = {
        let p = shared.params.lock();
        (p.duration, p.strength / 100.0, p.size / 100.0, p.color.clone())
    };

    let token = shared.slot.issue();
    let scene = Arc::clone(&ctx.scene);
    animate_over(&ctx.frames, duration, token, move |t| {
        let (opacity, scale) = if t < 0.4 {
            let rise = t / 0.4;
            (strength * rise, 0.8 + (size - 0.8) * rise)
        } else {
            let fall = (t - 0.4) / 0.6;
            (strength * (1.0 - fall), size * (1.0 + 0.2 * fall))
        };
        let mut scene = scene.lock();
        if let Some(v) = scene.visual_mut(glow) {
            v.opacity = opacity.clamp(0.0, 1.0);
            v.width = GLOW_BASE_SIZE * scale;
            v.height = GLOW_BASE_SIZE * scale;
            v.color = Some(color.clone());
        }
    });
}

fn start(state: &mut EffectState, ctx: &Context) -> CfResult<()> {
    let wrap: NodeId = match ctx.store.get(crate::coin::WRAP_NODE_KEY) {
        Some(value) if !value.is_null() => serde_json::from_value(value)?,
        _ => {
            return Err(CfError::Module(
                "coinEffects: coin wrap node not published".into(),
            ))
        }
    };

    let glow = {
        let mut scene = ctx.scene.lock();
        let glow = scene.create_node(wrap, "coin-glow");
        if let Some(v) = scene.visual_mut(glow) {
            v.opacity = 0.0;
            v.width = GLOW_BASE_SIZE;
            v.height = GLOW_BASE_SIZE;
        }
        glow
    };
    *state.shared.glow.lock() = Some(glow);

    let shared = Arc::clone(&state.shared);
    let handler_ctx = ctx.clone();
    ctx.bus.on(
        topics::COIN_SPIN_END,
        cf_bus::SubscribeOpts::owner(KEY),
        move |_payload| run_glow(&handler_ctx, &shared),
    );
    Ok(())
}

fn disable(state: &mut EffectState, ctx: &Context) -> CfResult<()> {
    state.shared.slot.cancel_active();
    if let Some(glow) = state.shared.glow.lock().take() {
        ctx.scene.lock().remove_node(glow);
    }
    Ok(())
}

/// Build and register the coin effects module.
pub fn register(registry: &mut Registry) {
    ModuleBuilder::new(KEY, "Coin effects", EffectState::default())
        .inspector(inspector())
        .depends_on(&[crate::coin::KEY])
        .on_start(|state, args| {
            let Some(ctx) = args.ctx else {
                return Err(CfError::Module("coinEffects started without context".into()));
            };
            for (name, value) in args.params {
                apply_glow_param(&mut state.shared.params.lock(), name, value);
            }
            start(state, ctx)
        })
        .on_disable(|state, args| {
            let Some(ctx) = args.ctx else {
                return Ok(());
            };
            disable(state, ctx)
        })
        .on_param(|state, param, value, _args| {
            apply_glow_param(&mut state.shared.params.lock(), param, value);
            Ok(())
        })
        .register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_bus::EventBus;
    use cf_core::Scene;
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

    fn glow_node(ctx: &Context) -> NodeId {
        let wrap: NodeId =
            serde_json::from_value(ctx.store.get(crate::coin::WRAP_NODE_KEY).unwrap()).unwrap();
        let scene = ctx.scene.lock();
        *scene
            .children(wrap)
            .iter()
            .find(|id| scene.node(**id).unwrap().label == "coin-glow")
            .unwrap()
    }

    #[test]
    fn test_enabling_effects_pulls_in_coin() {
        let mut registry = test_registry();
        crate::coin::register(&mut registry);
        register(&mut registry);

        registry.enable_module(KEY);
        assert!(registry.is_enabled(crate::coin::KEY));
        assert!(registry.is_enabled(KEY));
    }

    #[test]
    fn test_spin_end_pulses_the_glow() {
        let mut registry = test_registry();
        crate::coin::register(&mut registry);
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        let glow = glow_node(&ctx);
        assert_eq!(ctx.scene.lock().visual(glow).unwrap().opacity, 0.0);

        ctx.frames.tick(0.0);
        ctx.bus.emit_value(
            topics::COIN_SPIN_END,
            cf_core::events::SpinEnd {
                side: cf_core::Side::Avers,
            },
        );
        // Mid-pulse: visibly lit.
        ctx.frames.tick(20.0);
        ctx.frames.tick(200.0);
        let mid = ctx.scene.lock().visual(glow).unwrap().opacity;
        assert!(mid > 0.0);

        // Past the full duration the glow fades back out.
        let mut now = 400.0;
        while ctx.frames.task_count() > 0 {
            ctx.frames.tick(now);
            now += 50.0;
        }
        let after = ctx.scene.lock().visual(glow).unwrap().opacity;
        assert!(after < 1e-3);
    }

    #[test]
    fn test_disable_removes_glow_node() {
        let mut registry = test_registry();
        crate::coin::register(&mut registry);
        register(&mut registry);
        registry.enable_module(KEY);

        let ctx = registry.context().clone();
        let glow = glow_node(&ctx);

        registry.disable_module(KEY);
        assert!(!ctx.scene.lock().contains(glow));
        // The coin itself stays up: only its dependent went down.
        assert!(registry.is_enabled(crate::coin::KEY));
    }

    #[test]
    fn test_start_without_wrap_key_fails_cleanly() {
        let mut registry = test_registry();
        // Register only the effects module with no dependency present.
        ModuleBuilder::new(KEY, "Coin effects", EffectState::default())
            .on_start(|state, args| {
                let Some(ctx) = args.ctx else {
                    return Err(CfError::Module("no context".into()));
                };
                start(state, ctx)
            })
            .register(&mut registry);

        registry.enable_module(KEY);
        // Failed start leaves the module disabled and retryable.
        assert!(!registry.is_enabled(KEY));
    }
}
