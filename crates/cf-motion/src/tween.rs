//! Token-gated tween tasks
//!
//! Finite animation steps in the shape the original's `animateOver`/`wait`
//! helpers had: a duration, a progress callback, and a cancellation token
//! checked at the top of every resumed frame.

use crate::scheduler::{FrameScheduler, TaskId, TaskStatus};
use crate::token::CancelToken;

/// Drive `step` with progress in [0, 1] over `duration_s` seconds.
///
/// The final `step(1.0)` call is guaranteed on normal completion; a
/// cancelled token resolves the task immediately without further calls.
pub fn animate_over<F>(
    scheduler: &FrameScheduler,
    duration_s: f32,
    token: CancelToken,
    mut step: F,
) -> TaskId
where
    F: FnMut(f32) + Send + 'static,
{
    let mut start: Option<f64> = None;
    scheduler.spawn(move |tick| {
        if token.is_cancelled() {
            return TaskStatus::Done;
        }
        let started = *start.get_or_insert(tick.now_ms);
        let t = if duration_s <= 0.0 {
            1.0
        } else {
            (((tick.now_ms - started) / (f64::from(duration_s) * 1000.0)) as f32).min(1.0)
        };
        step(t);
        if t < 1.0 {
            TaskStatus::Running
        } else {
            TaskStatus::Done
        }
    })
}

/// Run `action` once after `duration_s` seconds of frame time.
pub fn delay<F>(
    scheduler: &FrameScheduler,
    duration_s: f32,
    token: CancelToken,
    action: F,
) -> TaskId
where
    F: FnOnce() + Send + 'static,
{
    let mut action = Some(action);
    let mut deadline: Option<f64> = None;
    scheduler.spawn(move |tick| {
        if token.is_cancelled() {
            return TaskStatus::Done;
        }
        let end = *deadline.get_or_insert(tick.now_ms + f64::from(duration_s) * 1000.0);
        if tick.now_ms < end {
            return TaskStatus::Running;
        }
        if let Some(action) = action.take() {
            action();
        }
        TaskStatus::Done
    })
}
