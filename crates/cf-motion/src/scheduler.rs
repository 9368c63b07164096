//! Frame task scheduler
//!
//! The host drives the scheduler by calling `tick(now_ms)` once per frame
//! callback. Tasks are boxed `FnMut(FrameTick) -> TaskStatus` closures that
//! suspend between frames simply by returning `Running`.
//!
//! Frames arriving faster than the configured cap are skipped outright
//! (the original gated its render loop the same way); dt is measured
//! between executed frames.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default frame-rate cap
pub const DEFAULT_FPS_CAP: f64 = 60.0;

/// Clock sample handed to every task on an executed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    /// Host clock, milliseconds
    pub now_ms: f64,
    /// Seconds since the previous executed frame (0.0 on the first)
    pub dt: f32,
}

/// Whether a task wants to keep running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Done,
}

/// Handle to a spawned frame task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

type FrameTask = Box<dyn FnMut(FrameTick) -> TaskStatus + Send>;

struct SchedulerInner {
    tasks: Vec<(TaskId, FrameTask)>,
    /// Tasks spawned while a tick is executing; joined after the pass so a
    /// newly spawned task never runs in the frame that spawned it.
    pending: Vec<(TaskId, FrameTask)>,
    cancelled: HashSet<TaskId>,
    ticking: bool,
    min_frame_interval_ms: f64,
    last_time_ms: Option<f64>,
    last_frame_ms: Option<f64>,
}

/// Cooperative frame scheduler shared by all modules
pub struct FrameScheduler {
    inner: Mutex<SchedulerInner>,
    next_id: AtomicU64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::with_fps_cap(DEFAULT_FPS_CAP)
    }

    pub fn with_fps_cap(fps: f64) -> Self {
        Self {
            inner: Mutex::new(SchedulerInner {
                tasks: Vec::new(),
                pending: Vec::new(),
                cancelled: HashSet::new(),
                ticking: false,
                min_frame_interval_ms: 1000.0 / fps.max(1.0),
                last_time_ms: None,
                last_frame_ms: None,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a shared scheduler handle.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a frame task. Tasks spawned from inside a running task
    /// start on the next executed frame.
    pub fn spawn<F>(&self, task: F) -> TaskId
    where
        F: FnMut(FrameTick) -> TaskStatus + Send + 'static,
    {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.inner.lock();
        let entry = (id, Box::new(task) as FrameTask);
        if inner.ticking {
            inner.pending.push(entry);
        } else {
            inner.tasks.push(entry);
        }
        id
    }

    /// Remove a task. Safe to call from inside a running task.
    pub fn cancel(&self, id: TaskId) {
        let mut inner = self.inner.lock();
        if inner.ticking {
            inner.cancelled.insert(id);
            inner.pending.retain(|(tid, _)| *tid != id);
        } else {
            inner.tasks.retain(|(tid, _)| *tid != id);
        }
    }

    /// Execute one frame. Returns `false` when the frame was skipped by the
    /// fps gate.
    pub fn tick(&self, now_ms: f64) -> bool {
        let (mut running, tick) = {
            let mut inner = self.inner.lock();
            if let Some(last_frame) = inner.last_frame_ms {
                if now_ms - last_frame < inner.min_frame_interval_ms {
                    return false;
                }
            }
            let dt = inner
                .last_time_ms
                .map(|last| ((now_ms - last) / 1000.0) as f32)
                .unwrap_or(0.0);
            inner.last_time_ms = Some(now_ms);
            inner.last_frame_ms = Some(now_ms);
            inner.ticking = true;
            (
                std::mem::take(&mut inner.tasks),
                FrameTick { now_ms, dt },
            )
        };

        // Run without the lock so tasks may spawn/cancel re-entrantly.
        let mut kept: Vec<(TaskId, FrameTask)> = Vec::with_capacity(running.len());
        for (id, mut task) in running.drain(..) {
            if self.inner.lock().cancelled.contains(&id) {
                continue;
            }
            match task(tick) {
                TaskStatus::Running => kept.push((id, task)),
                TaskStatus::Done => {}
            }
        }

        let mut inner = self.inner.lock();
        let cancelled = std::mem::take(&mut inner.cancelled);
        kept.retain(|(id, _)| !cancelled.contains(id));
        let mut pending = std::mem::take(&mut inner.pending);
        kept.append(&mut pending);
        // Tasks registered by another thread mid-tick land in `tasks`.
        kept.append(&mut inner.tasks);
        inner.tasks = kept;
        inner.ticking = false;
        true
    }

    pub fn task_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.tasks.len() + inner.pending.len()
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_gate_skips_fast_frames() {
        let scheduler = FrameScheduler::with_fps_cap(60.0);
        assert!(scheduler.tick(0.0));
        // 5ms later: below the ~16.6ms interval, skipped.
        assert!(!scheduler.tick(5.0));
        assert!(scheduler.tick(20.0));
    }

    #[test]
    fn test_dt_measured_between_executed_frames() {
        let scheduler = FrameScheduler::with_fps_cap(60.0);
        let dts = Arc::new(Mutex::new(Vec::new()));
        let dts2 = Arc::clone(&dts);
        scheduler.spawn(move |tick| {
            dts2.lock().push(tick.dt);
            TaskStatus::Running
        });

        scheduler.tick(0.0);
        scheduler.tick(20.0);
        scheduler.tick(60.0);

        let dts = dts.lock();
        assert!(dts[0].abs() < 1e-6);
        assert!((dts[1] - 0.020).abs() < 1e-6);
        assert!((dts[2] - 0.040).abs() < 1e-6);
    }

    #[test]
    fn test_done_task_is_removed() {
        let scheduler = FrameScheduler::new();
        let runs = Arc::new(Mutex::new(0u32));
        let runs2 = Arc::clone(&runs);
        scheduler.spawn(move |_| {
            *runs2.lock() += 1;
            TaskStatus::Done
        });

        scheduler.tick(0.0);
        scheduler.tick(100.0);
        assert_eq!(*runs.lock(), 1);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn test_spawn_during_tick_defers_one_frame() {
        let scheduler = Arc::new(FrameScheduler::new());
        let runs = Arc::new(Mutex::new(Vec::new()));

        let scheduler2 = Arc::clone(&scheduler);
        let runs2 = Arc::clone(&runs);
        scheduler.spawn(move |_| {
            runs2.lock().push("outer");
            let runs3 = Arc::clone(&runs2);
            scheduler2.spawn(move |_| {
                runs3.lock().push("inner");
                TaskStatus::Done
            });
            TaskStatus::Done
        });

        scheduler.tick(0.0);
        assert_eq!(*runs.lock(), vec!["outer"]);
        scheduler.tick(100.0);
        assert_eq!(*runs.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn test_cancel_during_tick() {
        let scheduler = Arc::new(FrameScheduler::new());
        let runs = Arc::new(Mutex::new(0u32));

        let runs2 = Arc::clone(&runs);
        let victim = scheduler.spawn(move |_| {
            *runs2.lock() += 1;
            TaskStatus::Running
        });

        let scheduler2 = Arc::clone(&scheduler);
        scheduler.spawn(move |_| {
            scheduler2.cancel(victim);
            TaskStatus::Done
        });

        scheduler.tick(0.0);
        let after_first = *runs.lock();
        scheduler.tick(100.0);
        // The victim never runs again once cancelled.
        assert_eq!(*runs.lock(), after_first);
    }
}
