//! Coin flip state machine
//!
//! Two cooperating pieces drive the visible coin:
//!
//! 1. `CoinMotion` — the continuous rotation state. A dedicated render-loop
//!    task advances the angle from the current speed every executed frame,
//!    and eases the speed toward the configured base while no sequence is
//!    active. The spin never stalls while discrete phases transition.
//! 2. `FlipRun` — one cancellable flip sequence, advanced by `step(dt)`.
//!    Each step checks its token first; a superseded or cancelled run halts
//!    at the next resumption point without touching the shared motion.
//!
//! Face visibility is a pure function of the current angle
//! (`face_visuals`), independent of phase, so external angle changes are
//! reflected immediately.

use cf_core::{lerp, lerp_angle, Ease, Side, TWO_PI};

use crate::token::{CancelToken, TokenSlot};

/// Minimum horizontal squash so the coin never collapses to zero width
const MIN_SCALE_X: f32 = 0.04;

/// Landing dip duration, seconds
const BOUNCE_DURATION: f32 = 0.2;

/// How quickly idle speed follows the configured base speed (1/s)
const IDLE_FOLLOW_RATE: f32 = 8.0;

/// Tunable parameters of the coin, fed by the inspector
#[derive(Debug, Clone, PartialEq)]
pub struct CoinParams {
    /// Coin diameter, px
    pub coin_size: f32,
    /// Half-band of |cos θ| inside which the edge sprite cross-fades in
    pub edge_width: f32,
    /// Idle rotation speed, deg/s
    pub base_speed: f32,
    /// Jump apex height, px
    pub jump_height: f32,
    /// Landing dip depth, px
    pub landing_depth: f32,
    /// Full jump (up + down) duration, s
    pub jump_duration: f32,
    /// Base-to-boost speed ramp duration, s
    pub accel_duration: f32,
    /// Airborne boost hold, s
    pub spin_duration: f32,
    /// Boosted rotation speed, deg/s
    pub boost_speed: f32,
    /// Extra full rotations granted to the deceleration
    pub extra_rotations: f32,
    /// Clamp band for the computed slowdown duration, s
    pub slow_min: f32,
    pub slow_max: f32,
    /// Settle-onto-face duration, s
    pub align_duration: f32,
    /// Rest on the decided face, s
    pub pause_duration: f32,
    /// Speed 0 → base ramp after the pause, s
    pub return_duration: f32,
    /// Probability of avers in [0, 1]
    pub heads_chance: f64,
}

impl Default for CoinParams {
    fn default() -> Self {
        Self {
            coin_size: 170.0,
            edge_width: 0.1,
            base_speed: 75.0,
            jump_height: 60.0,
            landing_depth: 50.0,
            jump_duration: 0.2,
            accel_duration: 0.2,
            spin_duration: 1.2,
            boost_speed: 1600.0,
            extra_rotations: 2.5,
            slow_min: 0.8,
            slow_max: 4.0,
            align_duration: 0.4,
            pause_duration: 0.5,
            return_duration: 0.5,
            heads_chance: 0.5,
        }
    }
}

/// Shared rotation state, single-writer-at-a-time between suspension points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoinMotion {
    /// Current angle, radians in [0, 2π)
    pub angle: f32,
    /// Current rotation speed, deg/s
    pub speed: f32,
    /// Vertical offset of the coin wrap, px (negative = up)
    pub lift_y: f32,
}

impl CoinMotion {
    pub fn new(base_speed: f32) -> Self {
        Self {
            angle: 0.0,
            speed: base_speed,
            lift_y: 0.0,
        }
    }

    /// Advance the continuous rotation by `dt` seconds. While `idle`, the
    /// speed eases toward `base_speed` so live edits to the base speed take
    /// effect immediately rather than on the next flip.
    pub fn advance(&mut self, dt: f32, idle: bool, base_speed: f32) {
        if idle {
            self.speed += (base_speed - self.speed) * (dt * IDLE_FOLLOW_RATE).min(1.0);
        }
        self.angle = (self.angle + self.speed.to_radians() * dt).rem_euclid(TWO_PI);
    }

    /// Reset to the start of a fresh flip.
    pub fn reset(&mut self, base_speed: f32) {
        self.angle = 0.0;
        self.speed = base_speed;
        self.lift_y = 0.0;
    }
}

/// Per-frame face rendering state, derived purely from the angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceVisuals {
    pub scale_x: f32,
    pub avers_opacity: f32,
    pub revers_opacity: f32,
    pub edge_opacity: f32,
}

/// Pure angle-to-visual mapping: cos θ gives the horizontal squash and the
/// visible face; |cos θ| inside the edge band cross-fades to the edge
/// sprite. No hidden state.
pub fn face_visuals(angle: f32, edge_width: f32) -> FaceVisuals {
    let c = angle.cos();
    let abs_c = c.abs();
    let scale_x = abs_c.max(MIN_SCALE_X);

    if abs_c < edge_width {
        FaceVisuals {
            scale_x,
            avers_opacity: 0.0,
            revers_opacity: 0.0,
            edge_opacity: 1.0 - abs_c / edge_width,
        }
    } else if c >= 0.0 {
        FaceVisuals {
            scale_x,
            avers_opacity: 1.0,
            revers_opacity: 0.0,
            edge_opacity: 0.0,
        }
    } else {
        FaceVisuals {
            scale_x,
            avers_opacity: 0.0,
            revers_opacity: 1.0,
            edge_opacity: 0.0,
        }
    }
}

/// Weighted face draw. `roll` is a uniform sample in [0, 1), injected so
/// the draw stays deterministic under test.
pub fn decide_side(heads_chance: f64, roll: f64) -> Side {
    if roll < heads_chance {
        Side::Avers
    } else {
        Side::Revers
    }
}

/// Deceleration duration for the current angular speed.
///
/// The slowdown eases speed from `speed` to 0 with a cubic ease-out, whose
/// decay integrates to 1/4: the coin covers `speed * d / 4` degrees over a
/// slowdown of length `d`. Granting `extra_rotations` full turns gives
/// `d = 4 * extra / speed`, clamped to the configured band, so a faster
/// spin earns a longer, smoother deceleration instead of an abrupt stop.
pub fn slowdown_duration(speed_deg: f32, params: &CoinParams) -> f32 {
    if speed_deg <= 0.0 {
        return params.slow_min;
    }
    let extra_deg = params.extra_rotations * 360.0;
    (4.0 * extra_deg / speed_deg).clamp(params.slow_min, params.slow_max)
}

/// Phases of one flip sequence, in order. Cancellation can occur between
/// any two and short-circuits to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipPhase {
    Idle,
    DecisionMade,
    JumpingUp,
    JumpingDown,
    Bouncing,
    Boosting,
    SlowingDown,
    Finalized,
    Pausing,
    Returning,
}

/// Outcome of one `FlipRun::step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipStep {
    /// Sequence still running
    Continue,
    /// Finalize boundary crossed: the coin has settled on `Side`.
    /// Reported exactly once per completed sequence.
    Settled(Side),
    /// Sequence fully finished; the coin is idle again
    Done,
    /// Token cancelled or superseded; no further visual state was applied
    Halted,
}

/// One in-flight flip sequence
pub struct FlipRun {
    token: CancelToken,
    phase: FlipPhase,
    elapsed: f32,
    side: Side,
    slow_from: f32,
    slow_duration: f32,
    align_from: f32,
}

impl FlipRun {
    /// Begin a new sequence: supersedes whatever run holds the slot, resets
    /// the shared motion, and draws the target face.
    pub fn begin(slot: &TokenSlot, params: &CoinParams, motion: &mut CoinMotion, roll: f64) -> Self {
        let token = slot.issue();
        motion.reset(params.base_speed);
        let side = decide_side(params.heads_chance, roll);
        log::debug!("[coin] flip {} decided: {}", token.seq(), side.as_str());
        Self {
            token,
            phase: FlipPhase::DecisionMade,
            elapsed: 0.0,
            side,
            slow_from: 0.0,
            slow_duration: 0.0,
            align_from: 0.0,
        }
    }

    pub fn phase(&self) -> FlipPhase {
        self.phase
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Advance the sequence by `dt` seconds.
    ///
    /// The token is inspected first: a stale run halts immediately and
    /// leaves the shared motion untouched, so at most one sequence ever
    /// drives the visible coin.
    pub fn step(
        &mut self,
        dt: f32,
        motion: &mut CoinMotion,
        params: &CoinParams,
        slot: &TokenSlot,
    ) -> FlipStep {
        if !slot.is_live(&self.token) {
            self.phase = FlipPhase::Idle;
            return FlipStep::Halted;
        }

        self.elapsed += dt;
        match self.phase {
            FlipPhase::Idle => FlipStep::Done,

            FlipPhase::DecisionMade => {
                self.advance_to(FlipPhase::JumpingUp);
                FlipStep::Continue
            }

            FlipPhase::JumpingUp => {
                // Speed ramp and ascent run in parallel, possibly with
                // different durations; the phase ends when both have.
                let ramp_t = phase_t(self.elapsed, params.accel_duration);
                motion.speed = lerp(
                    params.base_speed,
                    params.boost_speed,
                    Ease::OutQuad.evaluate(ramp_t),
                );
                let up_duration = params.jump_duration * 0.5;
                let up_t = phase_t(self.elapsed, up_duration);
                motion.lift_y = -params.jump_height * Ease::OutSine.evaluate(up_t);

                if self.elapsed >= up_duration.max(params.accel_duration) {
                    self.advance_to(FlipPhase::JumpingDown);
                }
                FlipStep::Continue
            }

            FlipPhase::JumpingDown => {
                let down_duration = params.jump_duration * 0.5;
                let t = phase_t(self.elapsed, down_duration);
                motion.lift_y = -params.jump_height * (t * std::f32::consts::FRAC_PI_2).cos();
                if t >= 1.0 {
                    motion.lift_y = 0.0;
                    self.advance_to(FlipPhase::Bouncing);
                }
                FlipStep::Continue
            }

            FlipPhase::Bouncing => {
                let t = phase_t(self.elapsed, BOUNCE_DURATION);
                motion.lift_y = params.landing_depth * Ease::Arc.evaluate(t);
                if t >= 1.0 {
                    motion.lift_y = 0.0;
                    self.advance_to(FlipPhase::Boosting);
                }
                FlipStep::Continue
            }

            FlipPhase::Boosting => {
                motion.speed = params.boost_speed;
                if self.elapsed >= params.spin_duration {
                    self.slow_from = motion.speed;
                    self.slow_duration = slowdown_duration(motion.speed, params);
                    self.advance_to(FlipPhase::SlowingDown);
                }
                FlipStep::Continue
            }

            FlipPhase::SlowingDown => {
                let t = phase_t(self.elapsed, self.slow_duration);
                motion.speed = self.slow_from * (1.0 - Ease::OutCubic.evaluate(t));
                if t >= 1.0 {
                    motion.speed = 0.0;
                    self.align_from = motion.angle;
                    self.advance_to(FlipPhase::Finalized);
                }
                FlipStep::Continue
            }

            FlipPhase::Finalized => {
                let target = match self.side {
                    Side::Avers => 0.0,
                    Side::Revers => std::f32::consts::PI,
                };
                let t = phase_t(self.elapsed, params.align_duration);
                motion.angle =
                    lerp_angle(self.align_from, target, Ease::OutQuad.evaluate(t)).rem_euclid(TWO_PI);
                if t >= 1.0 {
                    motion.angle = target;
                    self.advance_to(FlipPhase::Pausing);
                    // The finalize boundary: the decided face is now final.
                    return FlipStep::Settled(self.side);
                }
                FlipStep::Continue
            }

            FlipPhase::Pausing => {
                if self.elapsed >= params.pause_duration {
                    self.advance_to(FlipPhase::Returning);
                }
                FlipStep::Continue
            }

            FlipPhase::Returning => {
                let t = phase_t(self.elapsed, params.return_duration);
                motion.speed = params.base_speed * t;
                if t >= 1.0 {
                    motion.speed = params.base_speed;
                    self.phase = FlipPhase::Idle;
                    slot.finish(&self.token);
                    return FlipStep::Done;
                }
                FlipStep::Continue
            }
        }
    }

    fn advance_to(&mut self, phase: FlipPhase) {
        self.phase = phase;
        self.elapsed = 0.0;
    }
}

/// Normalized progress within a phase; zero-length phases complete at once.
#[inline]
fn phase_t(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        1.0
    } else {
        (elapsed / duration).min(1.0)
    }
}
