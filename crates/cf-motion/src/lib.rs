//! CoinForge Animation Sequencer
//!
//! Cooperative, frame-callback-driven animation core:
//! - `FrameScheduler`: boxed frame tasks driven by a host-supplied clock,
//!   with a capped frame rate (frames below the minimum interval are
//!   skipped)
//! - `CancelToken`/`TokenSlot`: cooperative cancellation via a shared
//!   cancelled flag plus a monotonic sequence id; stale tokens halt at the
//!   next resumption point
//! - `animate_over`/`delay`: token-gated finite tween tasks
//! - `FlipRun`: the multi-phase coin flip state machine, plus the pure
//!   angle-to-visual math (`face_visuals`) and the continuous rotation
//!   state (`CoinMotion`)
//!
//! There is no parallelism here: all "concurrency" is interleaving between
//! frame callbacks on the single control thread.

mod coin;
mod scheduler;
mod token;
mod tween;

pub use coin::{
    decide_side, face_visuals, slowdown_duration, CoinMotion, CoinParams, FaceVisuals, FlipPhase,
    FlipRun, FlipStep,
};
pub use scheduler::{FrameScheduler, FrameTick, TaskId, TaskStatus};
pub use token::{CancelToken, TokenSlot};
pub use tween::{animate_over, delay};
