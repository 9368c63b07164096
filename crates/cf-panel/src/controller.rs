//! Bottom-sheet offset/level state machine

use cf_core::events::PanelCleanup;

/// Number of discrete open levels (0 = closed, 1 = partial, 2 = full)
const LEVEL_COUNT: u8 = 3;

/// Content safe inset from the sheet's top edge, px
const TOP_INSET: f32 = 12.0;

/// Tunable panel parameters, fed by the inspector
#[derive(Debug, Clone, PartialEq)]
pub struct PanelParams {
    /// Level-1 height as a fraction of the viewport
    pub level1: f32,
    /// Level-2 height as a fraction of the viewport
    pub level2: f32,
    /// Snap/level-change animation duration, ms
    pub anim_duration_ms: f64,
    /// Maximum overlay darkness at full open
    pub overlay_darkness: f32,
    /// Flick detection threshold, px/s
    pub velocity_threshold: f32,
    /// Overscroll compression factor in (0, 1)
    pub rubber_resistance: f32,
}

impl Default for PanelParams {
    fn default() -> Self {
        Self {
            level1: 0.33,
            level2: 0.80,
            anim_duration_ms: 350.0,
            overlay_darkness: 0.5,
            velocity_threshold: 800.0,
            rubber_resistance: 0.35,
        }
    }
}

/// One published panel state: everything the module layer needs to emit
/// `trayPanel:offset` and position the sheet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelFrame {
    /// Offset clamped to [0, max] for consumers
    pub offset_px: f32,
    /// Actual (possibly rubber-banded) offset driving the sheet
    pub raw_offset: f32,
    /// Sheet translate from the viewport top, px
    pub translate_y: f32,
    /// Overlay darkness for this offset
    pub overlay_alpha: f32,
    /// Visible content height (dynamic scroll budget)
    pub content_max_height: f32,
    pub level: u8,
    pub dragging: bool,
    /// Whether the change should animate (false while tracking a finger)
    pub animate: bool,
}

/// Result of a level change
#[derive(Debug)]
pub struct PanelTransition {
    pub frame: PanelFrame,
    /// True when the sheet just closed to level 0 (content was torn down)
    pub closed: bool,
}

/// The bottom-sheet controller
pub struct PanelController {
    params: PanelParams,
    viewport_px: f32,
    level: u8,
    dragging: bool,
    current_offset: f32,
    cleanup: Option<PanelCleanup>,
}

impl PanelController {
    pub fn new(params: PanelParams, viewport_px: f32) -> Self {
        Self {
            params,
            viewport_px,
            level: 0,
            dragging: false,
            current_offset: 0.0,
            cleanup: None,
        }
    }

    pub fn params(&self) -> &PanelParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut PanelParams {
        &mut self.params
    }

    pub fn set_viewport(&mut self, viewport_px: f32) {
        self.viewport_px = viewport_px;
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn offset(&self) -> f32 {
        self.current_offset
    }

    pub fn dragging(&self) -> bool {
        self.dragging
    }

    /// Resting offset for a level, px from the bottom.
    pub fn offset_for_level(&self, level: u8) -> f32 {
        match level {
            2 => self.viewport_px * self.params.level2,
            1 => self.viewport_px * self.params.level1,
            _ => 0.0,
        }
    }

    /// Maximum legal offset (level 2's resting offset).
    pub fn max_offset(&self) -> f32 {
        self.viewport_px * self.params.level2
    }

    /// Apply a raw offset with rubber-band compression past the bounds.
    fn apply_offset(&mut self, raw_offset: f32, animate: bool, level_hint: u8) -> PanelFrame {
        let max = self.max_offset();
        let offset = if raw_offset < 0.0 {
            raw_offset * self.params.rubber_resistance
        } else if raw_offset > max {
            max + (raw_offset - max) * self.params.rubber_resistance
        } else {
            raw_offset
        };

        self.current_offset = offset;

        let clamped = offset.clamp(0.0, max);
        let ratio = if max > 0.0 { clamped / max } else { 0.0 };

        PanelFrame {
            offset_px: clamped,
            raw_offset: offset,
            translate_y: self.viewport_px - offset,
            overlay_alpha: ratio * self.params.overlay_darkness,
            content_max_height: (offset - TOP_INSET).max(0.0),
            level: level_hint,
            dragging: self.dragging,
            animate,
        }
    }

    /// Begin tracking a finger. Movement is applied without animation until
    /// `drag_end`.
    pub fn drag_start(&mut self) {
        self.dragging = true;
    }

    /// Incremental drag: raw offset = previous − dy (finger down = close).
    /// Returns `None` when no drag is in progress.
    pub fn drag_move(&mut self, dy: f32) -> Option<PanelFrame> {
        if !self.dragging {
            return None;
        }
        let raw = self.current_offset - dy;
        Some(self.apply_offset(raw, false, self.level))
    }

    /// Finish a drag with the release velocity in px/s (positive = down).
    ///
    /// A flick past the threshold advances one level in its direction
    /// regardless of which resting offset is geometrically nearest;
    /// otherwise the sheet snaps to the nearest level.
    pub fn drag_end(&mut self, vy: f32) -> PanelTransition {
        self.dragging = false;

        if vy.abs() >= self.params.velocity_threshold {
            let level = if vy < 0.0 {
                if self.level == 0 { 1 } else { 2 }
            } else if self.level == 2 {
                1
            } else {
                0
            };
            return self.set_level(level);
        }

        let offset = self.current_offset.clamp(0.0, self.max_offset());
        let nearest = (0..LEVEL_COUNT)
            .min_by(|a, b| {
                let da = (self.offset_for_level(*a) - offset).abs();
                let db = (self.offset_for_level(*b) - offset).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        self.set_level(nearest)
    }

    /// Programmatic level change: bypasses gesture logic and animates
    /// straight to the target level's offset. Closing to level 0 tears the
    /// mounted content down.
    pub fn set_level(&mut self, level: u8) -> PanelTransition {
        self.transition_to(level, true)
    }

    /// Like `set_level` but without animation (initial positioning).
    pub fn set_level_silent(&mut self, level: u8) -> PanelTransition {
        self.transition_to(level, false)
    }

    fn transition_to(&mut self, level: u8, animate: bool) -> PanelTransition {
        self.level = level.min(LEVEL_COUNT - 1);
        self.dragging = false;
        log::debug!("[panel] level -> {} animate={}", self.level, animate);

        let frame = self.apply_offset(self.offset_for_level(self.level), animate, self.level);

        let closed = self.level == 0;
        if closed {
            self.clear_content();
        }
        PanelTransition { frame, closed }
    }

    /// Mount new panel content. The previous content's cleanup always runs
    /// first, so at most one content is mounted at a time.
    pub fn set_content<F>(&mut self, mount: F)
    where
        F: FnOnce() -> Option<PanelCleanup>,
    {
        self.clear_content();
        self.cleanup = mount();
    }

    /// Unmount the current content, if any.
    pub fn clear_content(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }

    pub fn has_content(&self) -> bool {
        self.cleanup.is_some()
    }
}

impl Drop for PanelController {
    fn drop(&mut self) {
        self.clear_content();
    }
}
