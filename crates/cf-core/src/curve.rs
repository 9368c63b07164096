//! Easing curves and angle interpolation
//!
//! The small set of curves the animation phases actually use.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Full turn in radians
pub const TWO_PI: f32 = PI * 2.0;

/// Easing curve for time-based animation phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Ease {
    /// y = t
    #[default]
    Linear,
    /// Quadratic ease-out: fast start, slow end
    OutQuad,
    /// Cubic ease-out: faster start, slower end
    OutCubic,
    /// Sine quarter period: smooth ramp
    OutSine,
    /// Sine half period: rise to 1 at t=0.5, back to 0 at t=1
    Arc,
}

impl Ease {
    /// Evaluate the curve at position t (0.0 - 1.0)
    #[inline]
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::OutSine => (t * FRAC_PI_2).sin(),
            Self::Arc => (t * PI).sin(),
        }
    }
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Interpolate between two angles along the shortest arc.
///
/// Both angles are taken modulo 2π; the result is not normalized.
#[inline]
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    let mut d = (b - a).rem_euclid(TWO_PI);
    if d > PI {
        d -= TWO_PI;
    }
    a + d * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_boundaries() {
        for ease in [Ease::Linear, Ease::OutQuad, Ease::OutCubic, Ease::OutSine] {
            assert!(ease.evaluate(0.0).abs() < 0.001, "{:?} at 0.0", ease);
            assert!((ease.evaluate(1.0) - 1.0).abs() < 0.001, "{:?} at 1.0", ease);
            let mid = ease.evaluate(0.5);
            assert!(mid > 0.0 && mid < 1.0, "{:?} at 0.5 = {}", ease, mid);
        }
    }

    #[test]
    fn test_curve_monotonic() {
        for ease in [Ease::Linear, Ease::OutQuad, Ease::OutCubic, Ease::OutSine] {
            let mut prev = 0.0;
            for i in 0..=100 {
                let t = i as f32 / 100.0;
                let val = ease.evaluate(t);
                assert!(val >= prev - 0.0001, "{:?} at t={}", ease, t);
                prev = val;
            }
        }
    }

    #[test]
    fn test_arc_returns_to_zero() {
        assert!(Ease::Arc.evaluate(0.0).abs() < 0.001);
        assert!((Ease::Arc.evaluate(0.5) - 1.0).abs() < 0.001);
        assert!(Ease::Arc.evaluate(1.0).abs() < 0.001);
    }

    #[test]
    fn test_lerp_angle_shortest_arc() {
        // 350° to 10° should pass through 0°, not 180°.
        let a = 350.0_f32.to_radians();
        let b = 10.0_f32.to_radians();
        let mid = lerp_angle(a, b, 0.5);
        assert!((mid.rem_euclid(TWO_PI) - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_lerp_angle_endpoints() {
        let a = 1.0;
        let b = 2.5;
        assert!((lerp_angle(a, b, 0.0) - a).abs() < 1e-6);
        assert!((lerp_angle(a, b, 1.0).rem_euclid(TWO_PI) - b).abs() < 1e-5);
    }
}
