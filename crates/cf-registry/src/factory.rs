//! Declarative module construction
//!
//! [`ModuleBuilder`] assembles a [`Module`] implementation out of a typed
//! state value and a handful of lifecycle closures, so modules read as
//! declarations instead of trait boilerplate. The builder also wires the
//! boilerplate every module needs: the param bag seeded from inspector
//! defaults, clamping on incoming values, and the enabled guard around
//! `start`/`disable`.

use cf_core::{CfResult, ParamBag, ParamSpec, ParamValue};

use crate::context::Context;
use crate::module::Module;
use crate::registry::Registry;

/// Extra arguments handed to every lifecycle hook alongside the state.
pub struct HookArgs<'a> {
    /// The context captured at the last `start`; `None` before first enable
    pub ctx: Option<&'a Context>,
    /// The key the module was registered under
    pub key: &'a str,
    /// Last-applied parameter values, seeded from inspector defaults
    pub params: &'a ParamBag,
}

type StartHook<S> = Box<dyn FnMut(&mut S, &HookArgs) -> CfResult<()> + Send>;
type DisableHook<S> = Box<dyn FnMut(&mut S, &HookArgs) -> CfResult<()> + Send>;
type ParamHook<S> = Box<dyn FnMut(&mut S, &str, &ParamValue, &HookArgs) -> CfResult<()> + Send>;

/// Builder for [`BuiltModule`]. Start from [`ModuleBuilder::new`] with the
/// module's key, display name, and initial state.
pub struct ModuleBuilder<S: Send + 'static> {
    key: String,
    name: String,
    state: S,
    inspector: Vec<ParamSpec>,
    dependencies: Vec<String>,
    on_start: Option<StartHook<S>>,
    on_disable: Option<DisableHook<S>>,
    on_param: Option<ParamHook<S>>,
}

impl<S: Send + 'static> ModuleBuilder<S> {
    pub fn new(key: &str, name: &str, state: S) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            state,
            inspector: Vec::new(),
            dependencies: Vec::new(),
            on_start: None,
            on_disable: None,
            on_param: None,
        }
    }

    pub fn inspector(mut self, specs: Vec<ParamSpec>) -> Self {
        self.inspector = specs;
        self
    }

    pub fn depends_on(mut self, keys: &[&str]) -> Self {
        self.dependencies = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S, &HookArgs) -> CfResult<()> + Send + 'static,
    {
        self.on_start = Some(Box::new(hook));
        self
    }

    pub fn on_disable<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S, &HookArgs) -> CfResult<()> + Send + 'static,
    {
        self.on_disable = Some(Box::new(hook));
        self
    }

    pub fn on_param<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S, &str, &ParamValue, &HookArgs) -> CfResult<()> + Send + 'static,
    {
        self.on_param = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> BuiltModule<S> {
        let params: ParamBag = self
            .inspector
            .iter()
            .map(|spec| (spec.param.clone(), spec.value.clone()))
            .collect();
        BuiltModule {
            key: self.key,
            name: self.name,
            state: self.state,
            inspector: self.inspector,
            dependencies: self.dependencies,
            params,
            enabled: false,
            last_ctx: None,
            on_start: self.on_start,
            on_disable: self.on_disable,
            on_param: self.on_param,
        }
    }

    /// Build and register in one step, under the builder's key.
    pub fn register(self, registry: &mut Registry) {
        let key = self.key.clone();
        registry.register_module(&key, Box::new(self.build()));
    }
}

/// A [`Module`] assembled by [`ModuleBuilder`].
pub struct BuiltModule<S: Send + 'static> {
    key: String,
    name: String,
    state: S,
    inspector: Vec<ParamSpec>,
    dependencies: Vec<String>,
    params: ParamBag,
    enabled: bool,
    last_ctx: Option<Context>,
    on_start: Option<StartHook<S>>,
    on_disable: Option<DisableHook<S>>,
    on_param: Option<ParamHook<S>>,
}

impl<S: Send + 'static> BuiltModule<S> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn params(&self) -> &ParamBag {
        &self.params
    }

    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<S: Send + 'static> Module for BuiltModule<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn inspector(&self) -> &[ParamSpec] {
        &self.inspector
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn start(&mut self, ctx: &Context) -> CfResult<()> {
        if self.enabled {
            return Ok(());
        }
        self.last_ctx = Some(ctx.clone());
        if let Some(hook) = self.on_start.as_mut() {
            let args = HookArgs {
                ctx: self.last_ctx.as_ref(),
                key: &self.key,
                params: &self.params,
            };
            hook(&mut self.state, &args)?;
        }
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> CfResult<()> {
        if !self.enabled {
            return Ok(());
        }
        self.enabled = false;
        if let Some(hook) = self.on_disable.as_mut() {
            let args = HookArgs {
                ctx: self.last_ctx.as_ref(),
                key: &self.key,
                params: &self.params,
            };
            hook(&mut self.state, &args)?;
        }
        Ok(())
    }

    fn apply_param(&mut self, param: &str, value: ParamValue) -> CfResult<()> {
        let value = match self.inspector.iter().find(|s| s.param == param) {
            Some(spec) => spec.clamp(value),
            None => value,
        };
        self.params.insert(param.to_string(), value.clone());
        if let Some(hook) = self.on_param.as_mut() {
            let args = HookArgs {
                ctx: self.last_ctx.as_ref(),
                key: &self.key,
                params: &self.params,
            };
            hook(&mut self.state, param, &value, &args)?;
        }
        Ok(())
    }
}
