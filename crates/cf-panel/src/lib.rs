//! CoinForge Draggable Panel Controller
//!
//! A bottom sheet with three discrete open levels (closed = 0, partial = 1,
//! full = 2), driven by touch drags with velocity-based snapping and
//! rubber-band resistance past the bounds. The controller is pure state:
//! it maps gestures to offsets and returns `PanelFrame` snapshots for the
//! module layer to publish; it never touches the bus or scene itself.

mod controller;
mod velocity;

pub use controller::{PanelController, PanelFrame, PanelParams, PanelTransition};
pub use velocity::VelocitySampler;
