//! Release-velocity estimation from a rolling touch-sample window

use std::collections::VecDeque;

/// Rolling window of recent (timestamp, y) touch samples.
///
/// Samples older than the window are discarded as new ones arrive. If
/// trimming leaves fewer than two samples at release time, the last known
/// two-or-more-sample window is reused so an estimate is still possible.
#[derive(Debug, Clone)]
pub struct VelocitySampler {
    window_ms: f64,
    samples: VecDeque<(f64, f32)>,
    backup: Option<Vec<(f64, f32)>>,
}

impl VelocitySampler {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            samples: VecDeque::new(),
            backup: None,
        }
    }

    pub fn set_window(&mut self, window_ms: f64) {
        self.window_ms = window_ms;
    }

    /// Record one touch sample and trim the window.
    pub fn record(&mut self, t_ms: f64, y: f32) {
        self.samples.push_back((t_ms, y));
        let cutoff = t_ms - self.window_ms;
        while self.samples.front().is_some_and(|(t, _)| *t < cutoff) {
            self.samples.pop_front();
        }
        if self.samples.len() >= 2 {
            self.backup = Some(self.samples.iter().copied().collect());
        }
    }

    /// Velocity across the current window, px/s (positive = downward).
    /// Returns 0.0 when no usable window exists.
    pub fn velocity(&self) -> f32 {
        let live: Vec<(f64, f32)>;
        let window: &[(f64, f32)] = if self.samples.len() >= 2 {
            live = self.samples.iter().copied().collect();
            &live
        } else if let Some(backup) = &self.backup {
            backup
        } else {
            return 0.0;
        };

        let (t0, y0) = window[0];
        let (t1, y1) = window[window.len() - 1];
        let dt = t1 - t0;
        if dt <= 0.0 {
            return 0.0;
        }
        ((f64::from(y1 - y0) / dt) * 1000.0) as f32
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.backup = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_from_window() {
        let mut sampler = VelocitySampler::new(100.0);
        sampler.record(0.0, 0.0);
        sampler.record(50.0, 25.0);
        // 25px over 50ms = 500 px/s downward.
        assert!((sampler.velocity() - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_old_samples_are_trimmed() {
        let mut sampler = VelocitySampler::new(50.0);
        sampler.record(0.0, 0.0);
        sampler.record(200.0, 100.0);
        sampler.record(220.0, 110.0);
        // The t=0 sample fell out of the window: velocity uses 200→220.
        assert!((sampler.velocity() - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_backup_window_fallback() {
        let mut sampler = VelocitySampler::new(50.0);
        sampler.record(0.0, 0.0);
        sampler.record(20.0, 10.0);
        // A long stall trims everything but the newest sample.
        sampler.record(500.0, 10.0);
        assert_eq!(sampler.samples.len(), 1);
        // Velocity still computable from the backed-up window.
        assert!(sampler.velocity().abs() > 0.0);
    }

    #[test]
    fn test_no_samples_means_zero() {
        let sampler = VelocitySampler::new(100.0);
        assert_eq!(sampler.velocity(), 0.0);

        let mut sampler = VelocitySampler::new(100.0);
        sampler.record(0.0, 42.0);
        assert_eq!(sampler.velocity(), 0.0);
    }

    #[test]
    fn test_reset_clears_backup() {
        let mut sampler = VelocitySampler::new(100.0);
        sampler.record(0.0, 0.0);
        sampler.record(10.0, 10.0);
        sampler.reset();
        assert_eq!(sampler.velocity(), 0.0);
    }
}
