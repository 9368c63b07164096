//! cf-core: Shared types, traits, and utilities for CoinForge
//!
//! This crate provides the foundational types used across all CoinForge
//! crates: the error taxonomy, the inspector parameter schema, easing
//! curves, the headless scene graph that stands in for the DOM anchors a
//! renderer would own, and the typed payload structs of the cross-module
//! event contract.

mod curve;
mod error;
pub mod events;
mod params;
mod scene;

pub use curve::*;
pub use error::*;
pub use events::Side;
pub use params::*;
pub use scene::*;
