//! CoinForge Inspector Backend
//!
//! The headless half of the tuning panel: it owns the persisted settings
//! blob, replays stored values into the registry at boot, and exposes the
//! section model an inspector frontend renders (module name, enable
//! toggle, visible parameter controls).
//!
//! Persistence keys:
//! - `param::<moduleKey>::<paramName>` — last-applied parameter value
//! - `enabled::<moduleKey>` — module enable flag

mod settings;

pub use settings::{FileSettings, MemorySettings, SettingsBlob, SettingsStore};

use serde_json::Value;

use cf_core::{CfResult, ParamSpec, ParamValue};
use cf_registry::Registry;

fn param_key(module: &str, param: &str) -> String {
    format!("param::{module}::{param}")
}

fn enabled_key(module: &str) -> String {
    format!("enabled::{module}")
}

/// One module as the inspector frontend sees it
#[derive(Debug, Clone)]
pub struct ModuleSection {
    pub key: String,
    pub name: String,
    pub enabled: bool,
    /// Visible controls only; hidden specs stay tuning-file-only
    pub controls: Vec<ParamSpec>,
}

/// The inspector backend
pub struct Inspector {
    store: Box<dyn SettingsStore>,
    blob: SettingsBlob,
}

impl Inspector {
    /// Load the blob from `store`. A missing or unreadable blob starts
    /// empty rather than failing the boot.
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        let blob = store.load().unwrap_or_else(|err| {
            log::warn!("[inspector] failed to load settings: {err}");
            SettingsBlob::new()
        });
        Self { store, blob }
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.blob) {
            log::warn!("[inspector] failed to save settings: {err}");
        }
    }

    fn stored_param(&self, module: &str, param: &str) -> Option<ParamValue> {
        let value = self.blob.get(&param_key(module, param))?;
        serde_json::from_value(value.clone()).ok()
    }

    fn stored_enabled(&self, module: &str, fallback: bool) -> bool {
        self.blob
            .get(&enabled_key(module))
            .and_then(Value::as_bool)
            .unwrap_or(fallback)
    }

    /// Replay the blob into a freshly populated registry: stored parameter
    /// values are applied first (so a module starts with its tuned values
    /// already in the bag), then every module is enabled or disabled per
    /// its stored flag. Modules with no stored flag default to enabled.
    pub fn apply_stored(&self, registry: &mut Registry) {
        let modules: Vec<(String, Vec<String>)> = registry
            .modules()
            .iter()
            .map(|m| {
                (
                    m.key.to_string(),
                    m.inspector.iter().map(|s| s.param.clone()).collect(),
                )
            })
            .collect();

        for (key, params) in &modules {
            for param in params {
                if let Some(value) = self.stored_param(key, param) {
                    registry.apply_param(key, param, value);
                }
            }
        }
        for (key, _) in &modules {
            if self.stored_enabled(key, true) {
                registry.enable_module(key);
            } else {
                registry.disable_module(key);
            }
        }
    }

    /// Apply one parameter change and persist it.
    pub fn set_param(
        &mut self,
        registry: &mut Registry,
        module: &str,
        param: &str,
        value: ParamValue,
    ) {
        registry.apply_param(module, param, value.clone());
        match serde_json::to_value(&value) {
            Ok(json) => {
                self.blob.insert(param_key(module, param), json);
                self.persist();
            }
            Err(err) => log::warn!("[inspector] unstorable param value: {err}"),
        }
    }

    /// Toggle a module and persist the flag.
    pub fn set_enabled(&mut self, registry: &mut Registry, module: &str, enabled: bool) {
        if enabled {
            registry.enable_module(module);
        } else {
            registry.disable_module(module);
        }
        self.blob.insert(enabled_key(module), Value::Bool(enabled));
        self.persist();
    }

    /// Drop every stored override. The registry keeps running with its
    /// current values; the next boot starts from defaults.
    pub fn reset(&mut self) -> CfResult<()> {
        self.blob.clear();
        self.store.save(&self.blob)
    }

    /// Section model for a frontend, in registration order. Hidden specs
    /// are filtered out; stored values replace spec defaults so controls
    /// render the effective state.
    pub fn sections(&self, registry: &Registry) -> Vec<ModuleSection> {
        registry
            .modules()
            .iter()
            .map(|m| ModuleSection {
                key: m.key.to_string(),
                name: m.name.to_string(),
                enabled: m.enabled,
                controls: m
                    .inspector
                    .iter()
                    .filter(|spec| !spec.hidden)
                    .map(|spec| {
                        let mut spec = spec.clone();
                        if let Some(stored) = self.stored_param(m.key, &spec.param) {
                            spec.value = stored;
                        }
                        spec
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_bus::EventBus;
    use cf_core::Scene;
    use cf_motion::FrameScheduler;
    use cf_registry::{Context, ModuleBuilder};
    use cf_store::Store;
    use parking_lot::Mutex;
    use std::sync::Arc;

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

    type Applied = Arc<Mutex<Vec<(String, f64)>>>;

    fn probe_module(key: &str, applied: &Applied) -> impl FnOnce(&mut Registry) {
        let applied = Arc::clone(applied);
        let key = key.to_string();
        move |registry: &mut Registry| {
            ModuleBuilder::new(&key, &key, ())
                .inspector(vec![
                    ParamSpec::slider("Size", "size", 0.0, 100.0, 1.0, 50.0),
                    ParamSpec::slider("Gain", "gain", 0.0, 10.0, 0.1, 1.0).hidden(),
                ])
                .on_param(move |_state, param, value, args| {
                    applied
                        .lock()
                        .push((format!("{}:{}", args.key, param), value.as_f64().unwrap()));
                    Ok(())
                })
                .register(registry);
        }
    }

    fn blob_with(entries: &[(&str, Value)]) -> SettingsBlob {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_apply_stored_params_then_enable() {
        let mut registry = test_registry();
        let applied: Applied = Arc::new(Mutex::new(Vec::new()));
        probe_module("alpha", &applied)(&mut registry);

        let inspector = Inspector::new(Box::new(MemorySettings::with_blob(blob_with(&[
            ("param::alpha::size", serde_json::json!(75.0)),
        ]))));
        inspector.apply_stored(&mut registry);

        assert_eq!(*applied.lock(), vec![("alpha:size".to_string(), 75.0)]);
        // No stored flag: enabled by default.
        assert!(registry.is_enabled("alpha"));
    }

    #[test]
    fn test_stored_disabled_flag_wins() {
        let mut registry = test_registry();
        let applied: Applied = Arc::new(Mutex::new(Vec::new()));
        probe_module("alpha", &applied)(&mut registry);

        let inspector = Inspector::new(Box::new(MemorySettings::with_blob(blob_with(&[
            ("enabled::alpha", Value::Bool(false)),
        ]))));
        inspector.apply_stored(&mut registry);
        assert!(!registry.is_enabled("alpha"));
    }

    #[test]
    fn test_set_param_persists_and_applies() {
        let mut registry = test_registry();
        let applied: Applied = Arc::new(Mutex::new(Vec::new()));
        probe_module("alpha", &applied)(&mut registry);

        let store = Box::new(MemorySettings::new());
        let mut inspector = Inspector::new(store);
        inspector.set_param(&mut registry, "alpha", "size", ParamValue::Number(30.0));

        assert_eq!(*applied.lock(), vec![("alpha:size".to_string(), 30.0)]);
        // A fresh inspector over the same blob sees the stored value.
        assert_eq!(
            inspector.stored_param("alpha", "size"),
            Some(ParamValue::Number(30.0))
        );
    }

    #[test]
    fn test_set_enabled_round_trips_through_blob() {
        let mut registry = test_registry();
        let applied: Applied = Arc::new(Mutex::new(Vec::new()));
        probe_module("alpha", &applied)(&mut registry);

        let mut inspector = Inspector::new(Box::new(MemorySettings::new()));
        inspector.set_enabled(&mut registry, "alpha", true);
        assert!(registry.is_enabled("alpha"));

        inspector.set_enabled(&mut registry, "alpha", false);
        assert!(!registry.is_enabled("alpha"));
        assert!(!inspector.stored_enabled("alpha", true));
    }

    #[test]
    fn test_sections_hide_hidden_specs_and_show_stored_values() {
        let mut registry = test_registry();
        let applied: Applied = Arc::new(Mutex::new(Vec::new()));
        probe_module("alpha", &applied)(&mut registry);

        let inspector = Inspector::new(Box::new(MemorySettings::with_blob(blob_with(&[
            ("param::alpha::size", serde_json::json!(42.0)),
        ]))));

        let sections = inspector.sections(&registry);
        assert_eq!(sections.len(), 1);
        let section = &sections[0];
        assert_eq!(section.key, "alpha");
        // The hidden "gain" spec is filtered out.
        assert_eq!(section.controls.len(), 1);
        assert_eq!(section.controls[0].param, "size");
        assert_eq!(section.controls[0].value, ParamValue::Number(42.0));
    }

    #[test]
    fn test_reset_clears_overrides() {
        let mut registry = test_registry();
        let applied: Applied = Arc::new(Mutex::new(Vec::new()));
        probe_module("alpha", &applied)(&mut registry);

        let mut inspector = Inspector::new(Box::new(MemorySettings::new()));
        inspector.set_param(&mut registry, "alpha", "size", ParamValue::Number(30.0));
        inspector.reset().unwrap();
        assert_eq!(inspector.stored_param("alpha", "size"), None);
    }
}
