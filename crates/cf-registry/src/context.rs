//! Shared execution context handed to module lifecycle hooks

use std::sync::Arc;

use cf_bus::{EventBus, Payload};
use cf_core::{NodeId, SharedScene};
use cf_motion::FrameScheduler;
use cf_store::Store;

/// Everything a module may touch: the container anchor in the scene, the
/// bus, the store, and the frame scheduler. Cheap to clone; modules keep
/// the clone they receive in `start`.
#[derive(Clone)]
pub struct Context {
    /// Scene anchor the module builds its nodes under
    pub container: NodeId,
    pub scene: SharedScene,
    pub bus: Arc<EventBus>,
    pub store: Arc<Store>,
    pub frames: Arc<FrameScheduler>,
}

impl Context {
    pub fn new(
        container: NodeId,
        scene: SharedScene,
        bus: Arc<EventBus>,
        store: Arc<Store>,
        frames: Arc<FrameScheduler>,
    ) -> Self {
        Self {
            container,
            scene,
            bus,
            store,
            frames,
        }
    }

    /// Emit on a module's hook channel (`{moduleKey}:{hookName}`), the
    /// extension point external code may intercept.
    pub fn call_hook(&self, module_key: &str, hook: &str, payload: Payload) {
        self.bus.emit(&format!("{module_key}:{hook}"), payload);
    }
}
