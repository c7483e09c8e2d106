//! Timer behaviors: how a timer's internal clock advances and when it fires.
//!
//! A behavior is a tagged variant rather than a trait object. The
//! countdown/repeater split is closed, so matching on the kind inside
//! `update` avoids virtual dispatch while keeping the reset-and-reuse
//! semantics the pool depends on.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scheduler::TickContext;

/// Opaque payload handed to a parameterized callback on every fire.
pub type CallbackArgs = Vec<Box<dyn Any>>;

/// Plain timer callback. Receives a [`TickContext`] so it can queue
/// scheduler operations that apply after the current pass.
pub type Callback = Box<dyn FnMut(&mut TickContext)>;

/// Parameterized timer callback: also receives the argument payload
/// captured when the timer was created.
pub type ArgCallback = Box<dyn FnMut(&mut TickContext, &mut CallbackArgs)>;

/// Pool key: which firing rule a behavior instance implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// Fires once after a fixed duration, then completes.
    Countdown,
    /// Fires every fixed interval indefinitely; never self-terminates.
    Repeater,
}

/// The callback installed on a behavior instance.
pub enum CallbackSlot {
    /// Nothing installed. Only valid while the instance sits in the pool.
    Empty,
    Plain(Callback),
    WithArgs {
        callback: ArgCallback,
        args: CallbackArgs,
    },
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackSlot::Empty => f.write_str("Empty"),
            CallbackSlot::Plain(_) => f.write_str("Plain"),
            CallbackSlot::WithArgs { args, .. } => {
                write!(f, "WithArgs(len={})", args.len())
            }
        }
    }
}

/// One pooled behavior instance.
///
/// `main_interval` is the exit time for a countdown and the period for a
/// repeater. Instances cycle between the scheduler's working timers and the
/// behavior pool's free lists; [`Behavior::reset_for_pool`] scrubs all state
/// in between so nothing leaks across logically unrelated uses.
pub struct Behavior {
    kind: BehaviorKind,
    main_interval: f32,
    time_accumulated: f32,
    total_time_active: f32,
    elapsed_cycles: u32,
    completed: bool,
    callback: CallbackSlot,
}

impl Behavior {
    pub(crate) fn new(kind: BehaviorKind) -> Self {
        Self {
            kind,
            main_interval: 0.0,
            time_accumulated: 0.0,
            total_time_active: 0.0,
            elapsed_cycles: 0,
            completed: false,
            callback: CallbackSlot::Empty,
        }
    }

    /// Arm a fresh or recycled instance with its driving interval and callback.
    pub(crate) fn arm(&mut self, interval: f32, callback: CallbackSlot) {
        self.main_interval = interval;
        self.callback = callback;
    }

    pub fn kind(&self) -> BehaviorKind {
        self.kind
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Number of times this instance has fired since it was last armed.
    pub fn elapsed_cycles(&self) -> u32 {
        self.elapsed_cycles
    }

    /// Total time fed to this instance since it was last armed.
    pub fn total_time_active(&self) -> f32 {
        self.total_time_active
    }

    /// Time remaining until the next fire, clamped at zero.
    pub fn time_left(&self) -> f32 {
        (self.main_interval - self.time_accumulated).max(0.0)
    }

    /// Advance the accumulator by one frame delta and fire per the variant.
    ///
    /// A countdown fires once when the accumulator exceeds the exit time
    /// (strictly — landing exactly on it does not fire) and marks itself
    /// completed. A repeater fires once per crossed interval boundary, so an
    /// oversized delta spanning several intervals triggers several fires,
    /// and the remainder carries forward into the next cycle.
    pub(crate) fn update(&mut self, delta: f32, ctx: &mut TickContext) {
        self.time_accumulated += delta;
        self.total_time_active += delta;

        match self.kind {
            BehaviorKind::Countdown => {
                if self.time_accumulated > self.main_interval {
                    self.completed = true;
                    self.elapsed_cycles += 1;
                    self.fire(ctx);
                }
            }
            BehaviorKind::Repeater => {
                while self.time_accumulated > self.main_interval {
                    self.time_accumulated -= self.main_interval;
                    self.elapsed_cycles += 1;
                    self.fire(ctx);
                }
            }
        }
    }

    fn fire(&mut self, ctx: &mut TickContext) {
        match &mut self.callback {
            // A ticked behavior with nothing installed is a caller bug, not
            // a state the engine can continue from.
            CallbackSlot::Empty => panic!(
                "{:?} timer behavior ticked with no callback installed",
                self.kind
            ),
            CallbackSlot::Plain(callback) => callback(ctx),
            CallbackSlot::WithArgs { callback, args } => callback(ctx, args),
        }
    }

    /// Zero the clock and completion flag but keep the interval and
    /// callback. Used when a long-lived timer is re-armed across uses.
    pub(crate) fn rewind(&mut self) {
        self.time_accumulated = 0.0;
        self.completed = false;
    }

    /// Full scrub before the instance returns to the pool: zero every
    /// accumulator and drop the callback and its arguments.
    pub(crate) fn reset_for_pool(&mut self) {
        self.main_interval = 0.0;
        self.time_accumulated = 0.0;
        self.total_time_active = 0.0;
        self.elapsed_cycles = 0;
        self.completed = false;
        self.callback = CallbackSlot::Empty;
    }
}
