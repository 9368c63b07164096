//! The module contract

use cf_core::{CfResult, ParamSpec, ParamValue};

use crate::context::Context;

/// An independently toggleable unit of behavior.
///
/// Most modules are produced by [`crate::ModuleBuilder`] rather than by
/// implementing this trait directly; the registry only relies on the
/// contract below.
///
/// Contract notes:
/// - `start` must not be invoked while already enabled (the registry
///   guards this; builder-made modules also guard internally)
/// - internal state is created once at registration and persists across
///   enable/disable cycles
/// - `disable` must detach everything `start` attached and cancel any
///   in-flight async work
pub trait Module: Send {
    /// Display name
    fn name(&self) -> &str;

    /// Parameter schema consumed by the inspector
    fn inspector(&self) -> &[ParamSpec];

    /// Keys of modules that must be enabled before this one
    fn dependencies(&self) -> &[String];

    fn is_enabled(&self) -> bool;

    fn start(&mut self, ctx: &Context) -> CfResult<()>;

    fn disable(&mut self) -> CfResult<()>;

    fn apply_param(&mut self, param: &str, value: ParamValue) -> CfResult<()>;
}
