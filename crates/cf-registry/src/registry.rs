//! Registry implementation

use std::collections::{HashMap, HashSet};

use cf_core::{ParamSpec, ParamValue};

use crate::context::Context;
use crate::module::Module;

struct Entry {
    module: Box<dyn Module>,
    enabled: bool,
}

/// Read-only view of one registered module
pub struct ModuleSnapshot<'a> {
    pub key: &'a str,
    pub name: &'a str,
    pub enabled: bool,
    pub inspector: &'a [ParamSpec],
    pub dependencies: &'a [String],
}

/// The module registry and lifecycle core
pub struct Registry {
    modules: HashMap<String, Entry>,
    /// dependency key → set of modules that declared it
    dependents: HashMap<String, HashSet<String>>,
    /// Registration order, for deterministic iteration
    order: Vec<String>,
    context: Context,
}

impl Registry {
    pub fn new(context: Context) -> Self {
        Self {
            modules: HashMap::new(),
            dependents: HashMap::new(),
            order: Vec::new(),
            context,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Record a module under `key`. Re-registering an existing key replaces
    /// the entry (old dependency edges are dropped first). A registration
    /// whose declared dependencies would close a cycle among known edges is
    /// rejected as a configuration error; the registry keeps operating for
    /// every other module.
    pub fn register_module(&mut self, key: &str, module: Box<dyn Module>) {
        if key.is_empty() {
            log::warn!("[registry] register_module: missing key");
            return;
        }
        if self.would_cycle(key, module.dependencies()) {
            log::error!(
                "[registry] register_module: {} rejected, dependencies {:?} close a cycle",
                key,
                module.dependencies()
            );
            return;
        }

        if self.modules.contains_key(key) {
            self.drop_edges(key);
        } else {
            self.order.push(key.to_string());
        }

        for dep in module.dependencies() {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .insert(key.to_string());
        }
        self.modules.insert(
            key.to_string(),
            Entry {
                module,
                enabled: false,
            },
        );
        log::info!("[registry] registered module: {}", key);
    }

    fn drop_edges(&mut self, key: &str) {
        for set in self.dependents.values_mut() {
            set.remove(key);
        }
        self.dependents.retain(|_, set| !set.is_empty());
    }

    /// Would adding `key` with `deps` let a dependency path lead back to
    /// `key` through already-declared edges?
    fn would_cycle(&self, key: &str, deps: &[String]) -> bool {
        let mut stack: Vec<&str> = deps.iter().map(String::as_str).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == key {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(entry) = self.modules.get(current) {
                stack.extend(entry.module.dependencies().iter().map(String::as_str));
            }
        }
        false
    }

    pub fn contains(&self, key: &str) -> bool {
        self.modules.contains_key(key)
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.modules.get(key).is_some_and(|e| e.enabled)
    }

    /// Snapshot of all modules in registration order.
    pub fn modules(&self) -> Vec<ModuleSnapshot<'_>> {
        self.order
            .iter()
            .filter_map(|key| {
                self.modules.get(key).map(|entry| ModuleSnapshot {
                    key,
                    name: entry.module.name(),
                    enabled: entry.enabled,
                    inspector: entry.module.inspector(),
                    dependencies: entry.module.dependencies(),
                })
            })
            .collect()
    }

    pub fn module<'a>(&'a self, key: &'a str) -> Option<ModuleSnapshot<'a>> {
        self.modules.get(key).map(|entry| ModuleSnapshot {
            key,
            name: entry.module.name(),
            enabled: entry.enabled,
            inspector: entry.module.inspector(),
            dependencies: entry.module.dependencies(),
        })
    }

    /// Enable `key`, depth-first enabling its declared dependencies first.
    ///
    /// The per-call visited set makes a diamond graph enable each module
    /// once and keeps a stray cycle from recursing forever (the cycle is a
    /// configuration error, not a runtime panic). A module is marked
    /// enabled only after its `start` returned Ok, so a failed start stays
    /// retryable.
    pub fn enable_module(&mut self, key: &str) {
        let mut visited = HashSet::new();
        self.enable_inner(key, &mut visited);
    }

    fn enable_inner(&mut self, key: &str, visited: &mut HashSet<String>) {
        if key.is_empty() || !visited.insert(key.to_string()) {
            return;
        }

        let deps = match self.modules.get(key) {
            Some(entry) => entry.module.dependencies().to_vec(),
            None => {
                log::warn!("[registry] enable_module: not found: {}", key);
                return;
            }
        };
        for dep in deps {
            self.enable_inner(&dep, visited);
        }

        let ctx = self.context.clone();
        if let Some(entry) = self.modules.get_mut(key) {
            if entry.enabled {
                return;
            }
            match entry.module.start(&ctx) {
                Ok(()) => {
                    entry.enabled = true;
                    log::info!("[registry] ENABLE {}", key);
                }
                Err(err) => {
                    log::error!("[registry] error starting {}: {}", key, err);
                }
            }
        }
    }

    /// Disable `key`, recursively disabling everything that depends on it
    /// first (the inverse of enable order), then stripping the module's
    /// bus subscriptions so no dangling listeners survive.
    pub fn disable_module(&mut self, key: &str) {
        let mut visited = HashSet::new();
        self.disable_inner(key, &mut visited);
    }

    fn disable_inner(&mut self, key: &str, visited: &mut HashSet<String>) {
        if key.is_empty() || !visited.insert(key.to_string()) {
            return;
        }
        if !self.modules.contains_key(key) {
            log::warn!("[registry] disable_module: not found: {}", key);
            return;
        }

        if let Some(dependents) = self.dependents.get(key) {
            let dependents: Vec<String> = dependents.iter().cloned().collect();
            for dependent in dependents {
                self.disable_inner(&dependent, visited);
            }
        }

        self.context.bus.off_module(key);

        if let Some(entry) = self.modules.get_mut(key) {
            if entry.enabled {
                if let Err(err) = entry.module.disable() {
                    log::error!("[registry] error disabling {}: {}", key, err);
                }
                entry.enabled = false;
                log::info!("[registry] DISABLE {}", key);
            }
        }
    }

    /// Dispatch a parameter change to a module. Missing module or a failing
    /// hook is logged and contained.
    pub fn apply_param(&mut self, key: &str, param: &str, value: ParamValue) {
        let Some(entry) = self.modules.get_mut(key) else {
            log::warn!("[registry] apply_param: no module {} ({})", key, param);
            return;
        };
        if let Err(err) = entry.module.apply_param(param, value) {
            log::error!("[registry] apply_param error {}:{}: {}", key, param, err);
        }
    }
}
