//! Cross-module event contract
//!
//! Event names and payload types that modules exchange over the bus. These
//! are the only coupling surface between modules: nothing here references a
//! concrete module implementation.
//!
//! Payloads travel the bus as `Arc<dyn Any + Send + Sync>`; the structs in
//! this module are the downcast targets. Callback-carrying payloads
//! (`TrayButtonSpec::on_click`, `OpenPanel::mount`) replace the closures
//! the original passed over its bus.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::scene::NodeId;

/// Event names used as the public contract between modules
pub mod topics {
    /// User pressed the coin (host input → coin module)
    pub const COIN_PRESS: &str = "coin:press";
    pub const COIN_SPIN_START: &str = "coin:spinStart";
    pub const COIN_SPIN_END: &str = "coin:spinEnd";

    pub const TRAY_REGISTER_BUTTON: &str = "tray:registerButton";
    pub const TRAY_UPDATE_BUTTON: &str = "tray:updateButton";
    pub const TRAY_BUTTON_PRESSED: &str = "tray:buttonPressed";
    pub const TRAY_SET_PANEL_LEVEL: &str = "tray:setPanelLevel";
    pub const TRAY_OPEN_PANEL: &str = "tray:openPanel";
    pub const TRAY_CLOSE_PANEL: &str = "tray:closePanel";
    pub const TRAY_PANEL_DRAG_START: &str = "tray:panelDragStart";
    pub const TRAY_PANEL_DRAG_MOVE: &str = "tray:panelDragMove";
    pub const TRAY_PANEL_DRAG_END: &str = "tray:panelDragEnd";

    pub const TRAY_PANEL_OFFSET: &str = "trayPanel:offset";
    pub const TRAY_PANEL_CLOSED: &str = "trayPanel:closed";
    pub const TRAY_PANEL_MOTION: &str = "trayPanel:motion";

    /// Host touch input, consumed by the tray's gesture translation
    pub const INPUT_TOUCH_START: &str = "input:touchStart";
    pub const INPUT_TOUCH_MOVE: &str = "input:touchMove";
    pub const INPUT_TOUCH_END: &str = "input:touchEnd";
}

/// Which face of the coin ended up visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Avers,
    Revers,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avers => "avers",
            Self::Revers => "revers",
        }
    }
}

/// Payload of `coin:spinEnd`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinEnd {
    pub side: Side,
}

/// Cleanup returned by a panel content mount
pub type PanelCleanup = Box<dyn FnOnce() + Send>;

/// Content mount callback: receives the panel's content node, returns an
/// optional cleanup invoked before the next mount or on close.
pub type MountFn = Arc<dyn Fn(NodeId) -> Option<PanelCleanup> + Send + Sync>;

/// Payload of `tray:openPanel`
#[derive(Clone, Default)]
pub struct OpenPanel {
    pub mount: Option<MountFn>,
}

/// Payload of `tray:setPanelLevel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPanelLevel {
    pub level: u8,
}

/// Payload of `tray:panelDragMove`: incremental vertical delta since the
/// previous sample, in pixels (positive = finger moving down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelDragMove {
    pub dy: f32,
}

/// Payload of `tray:panelDragEnd`: release velocity in px/s
/// (positive = downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelDragEnd {
    pub vy: f32,
}

/// Payload of `trayPanel:offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelOffset {
    pub offset_px: f32,
    pub level: u8,
    pub dragging: bool,
}

/// Payload of `trayPanel:motion`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelMotion {
    pub anim_duration_ms: f64,
}

/// Payload of `tray:registerButton`
#[derive(Clone)]
pub struct TrayButtonSpec {
    pub id: String,
    pub order: i32,
    /// Renderer-facing icon reference
    pub icon: String,
    /// Per-button icon size override
    pub icon_size: Option<f32>,
    pub on_click: Option<Arc<dyn Fn() + Send + Sync>>,
}

/// Payload of `tray:updateButton`
#[derive(Debug, Clone, PartialEq)]
pub struct TrayButtonUpdate {
    pub id: String,
    pub icon_size: f32,
}

/// Payload of `tray:buttonPressed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPressed {
    pub id: String,
}

/// One touch sample from the host (`input:touch*`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchSample {
    /// Host clock, milliseconds
    pub t_ms: f64,
    /// Vertical position, pixels from the top
    pub y: f32,
}
