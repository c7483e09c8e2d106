//! Pooled, tick-driven timers for fixed-timestep game loops.
//!
//! The host owns a [`TimerScheduler`], calls [`TimerScheduler::tick`] once
//! per frame with its scaled and unscaled deltas, and creates countdown or
//! repeater timers through the scheduler's factories. Completed timers and
//! their behavior instances are recycled through internal free lists, so
//! steady-state churn does not allocate.
//!
//! Timing is frame-grained: a timer fires on the first tick whose
//! accumulated delta exceeds the configured duration, so the actual firing
//! time may overshoot by up to one frame's delta.

pub mod behavior;
mod pool;
pub mod scheduler;

pub use behavior::{BehaviorKind, CallbackArgs};
pub use scheduler::{DeltaSource, PoolStats, TickContext, TimerId, TimerScheduler};
