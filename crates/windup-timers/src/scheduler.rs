//! Slot-arena timer scheduler: owns every live timer, drives them once per
//! host frame, and recycles completed handles and behaviors.
//!
//! The scheduler is an explicit object the host loop constructs and passes
//! to every timer-creating call site; there is no global timer state. All
//! mutation happens synchronously inside [`TimerScheduler::tick`], invoked
//! exactly once per frame on the single logical update thread.
//!
//! Completions and callback-issued operations are batched during the pass
//! and applied only after every working timer has been ticked, so a
//! callback can never mutate the working set being iterated and a timer
//! never observes another timer's mid-cycle removal.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::behavior::{Behavior, BehaviorKind, CallbackArgs, CallbackSlot};
use crate::pool::BehaviorPool;

/// Which of the two host-supplied frame deltas drives a timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaSource {
    /// Delta affected by the host's global time scale (the default).
    #[default]
    Scaled,
    /// Wall-clock delta, unaffected by time scaling.
    Unscaled,
}

/// Handle to a scheduled timer.
///
/// Copyable and cheap; the generation field guards against stale use, so
/// operations on a handle whose timer already completed or was destroyed
/// degrade to a warned no-op instead of touching a recycled slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    index: u32,
    generation: u32,
}

/// Read-only pool occupancy snapshot for diagnostics UIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Timer slots available for reuse.
    pub free_timers: usize,
    /// Timers currently registered for ticking (including paused ones).
    pub working_timers: usize,
    /// All slots ever created. Always `free_timers + working_timers`.
    pub total_timers: usize,
}

struct TimerEntry {
    behavior: Box<Behavior>,
    source: DeltaSource,
    paused: bool,
    /// Instead of being recycled on completion, rewind to a paused, zeroed
    /// state and stay registered. Used for long-lived timers whose owner
    /// re-arms them across uses.
    keep_on_complete: bool,
}

struct Slot {
    generation: u32,
    entry: Option<TimerEntry>,
}

enum TimerOp {
    Pause(TimerId),
    Unpause(TimerId),
    Reset(TimerId),
    Destroy(TimerId),
    Spawn(PendingSpawn),
}

struct PendingSpawn {
    kind: BehaviorKind,
    interval: f32,
    callback: CallbackSlot,
}

/// Deferred-operation queue handed to every timer callback.
///
/// Operations recorded here are applied once the current tick pass is over,
/// in the order they were queued. Spawning from a callback is
/// fire-and-forget: the new timer is registered after the pass and starts
/// accumulating on the next tick, so no handle is returned.
#[derive(Default)]
pub struct TickContext {
    ops: Vec<TimerOp>,
}

impl TickContext {
    pub fn pause(&mut self, id: TimerId) {
        self.ops.push(TimerOp::Pause(id));
    }

    pub fn unpause(&mut self, id: TimerId) {
        self.ops.push(TimerOp::Unpause(id));
    }

    /// Rewind a timer's clock to zero without otherwise changing it.
    pub fn reset(&mut self, id: TimerId) {
        self.ops.push(TimerOp::Reset(id));
    }

    pub fn destroy(&mut self, id: TimerId) {
        self.ops.push(TimerOp::Destroy(id));
    }

    /// Schedule a one-shot countdown from inside a callback.
    pub fn countdown(&mut self, duration: f32, callback: impl FnMut(&mut TickContext) + 'static) {
        self.ops.push(TimerOp::Spawn(PendingSpawn {
            kind: BehaviorKind::Countdown,
            interval: duration,
            callback: CallbackSlot::Plain(Box::new(callback)),
        }));
    }

    /// Schedule a periodic repeater from inside a callback.
    pub fn repeater(&mut self, interval: f32, callback: impl FnMut(&mut TickContext) + 'static) {
        assert!(interval > 0.0, "repeater interval must be positive");
        self.ops.push(TimerOp::Spawn(PendingSpawn {
            kind: BehaviorKind::Repeater,
            interval,
            callback: CallbackSlot::Plain(Box::new(callback)),
        }));
    }
}

/// The timer pool and scheduler.
///
/// Working timers tick in registration order. A completed timer is removed
/// from the working set at the end of the pass, its behavior scrubbed and
/// returned to the behavior pool, and its slot made available for the next
/// factory call. Acquisition always prefers recycled slots and behaviors
/// over fresh allocation.
#[derive(Default)]
pub struct TimerScheduler {
    slots: Vec<Slot>,
    free: Vec<u32>,
    working: Vec<TimerId>,
    behaviors: BehaviorPool,
    pending: TickContext,
    finished: Vec<TimerId>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a one-shot countdown that fires `callback` once `duration`
    /// seconds of its configured delta have accumulated.
    pub fn countdown(
        &mut self,
        duration: f32,
        callback: impl FnMut(&mut TickContext) + 'static,
    ) -> TimerId {
        self.spawn(
            BehaviorKind::Countdown,
            duration,
            CallbackSlot::Plain(Box::new(callback)),
        )
    }

    /// Create a periodic repeater that fires `callback` every `interval`
    /// seconds until destroyed.
    pub fn repeater(
        &mut self,
        interval: f32,
        callback: impl FnMut(&mut TickContext) + 'static,
    ) -> TimerId {
        self.spawn(
            BehaviorKind::Repeater,
            interval,
            CallbackSlot::Plain(Box::new(callback)),
        )
    }

    /// Countdown variant whose callback also receives an opaque argument
    /// payload stored at creation time.
    pub fn countdown_with_args(
        &mut self,
        duration: f32,
        callback: impl FnMut(&mut TickContext, &mut CallbackArgs) + 'static,
        args: CallbackArgs,
    ) -> TimerId {
        self.spawn(
            BehaviorKind::Countdown,
            duration,
            CallbackSlot::WithArgs {
                callback: Box::new(callback),
                args,
            },
        )
    }

    /// Repeater variant whose callback also receives an opaque argument
    /// payload stored at creation time.
    pub fn repeater_with_args(
        &mut self,
        interval: f32,
        callback: impl FnMut(&mut TickContext, &mut CallbackArgs) + 'static,
        args: CallbackArgs,
    ) -> TimerId {
        self.spawn(
            BehaviorKind::Repeater,
            interval,
            CallbackSlot::WithArgs {
                callback: Box::new(callback),
                args,
            },
        )
    }

    fn spawn(&mut self, kind: BehaviorKind, interval: f32, callback: CallbackSlot) -> TimerId {
        // A zero-period repeater would never leave its fire loop.
        if kind == BehaviorKind::Repeater {
            assert!(interval > 0.0, "repeater interval must be positive");
        }
        let mut behavior = self.behaviors.acquire(kind);
        behavior.arm(interval, callback);
        let entry = TimerEntry {
            behavior,
            source: DeltaSource::Scaled,
            paused: false,
            keep_on_complete: false,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                (self.slots.len() - 1) as u32
            }
        };
        let id = TimerId {
            index,
            generation: self.slots[index as usize].generation,
        };
        self.working.push(id);
        id
    }

    /// Drive every working timer once. The host calls this exactly once per
    /// frame with both of its deltas; each timer picks one per its
    /// [`DeltaSource`].
    pub fn tick(&mut self, scaled_delta: f32, unscaled_delta: f32) {
        let Self {
            slots,
            working,
            pending,
            finished,
            ..
        } = self;

        finished.clear();
        for &id in working.iter() {
            let Some(entry) = slots[id.index as usize].entry.as_mut() else {
                continue;
            };
            if entry.paused {
                continue;
            }
            let delta = match entry.source {
                DeltaSource::Scaled => scaled_delta,
                DeltaSource::Unscaled => unscaled_delta,
            };
            entry.behavior.update(delta, pending);
            if entry.behavior.completed() {
                if entry.keep_on_complete {
                    entry.behavior.rewind();
                    entry.paused = true;
                } else {
                    finished.push(id);
                }
            }
        }

        // Completions first: an op queued against a timer that finished in
        // this same pass lands on a stale handle and is dropped with a
        // warning rather than touching a recycled slot.
        while let Some(id) = self.finished.pop() {
            self.release(id);
        }

        let mut ops = std::mem::take(&mut self.pending.ops);
        for op in ops.drain(..) {
            self.apply(op);
        }
        // Hand the drained buffer back so steady-state ticking stays
        // allocation-free.
        self.pending.ops = ops;
    }

    /// Explicit early termination: return the timer to the free set and its
    /// behavior to the pool immediately. Destroying an already-released
    /// handle is a warned no-op.
    pub fn destroy(&mut self, id: TimerId) {
        if !self.is_active(id) {
            warn!(?id, "destroy on stale timer handle");
            return;
        }
        self.release(id);
    }

    /// Stop feeding deltas to a timer until it is unpaused.
    pub fn pause(&mut self, id: TimerId) {
        match self.entry_mut(id) {
            Some(entry) => entry.paused = true,
            None => warn!(?id, "pause on stale timer handle"),
        }
    }

    pub fn unpause(&mut self, id: TimerId) {
        match self.entry_mut(id) {
            Some(entry) => entry.paused = false,
            None => warn!(?id, "unpause on stale timer handle"),
        }
    }

    /// Rewind a timer's clock to zero, keeping its interval, callback,
    /// paused state, and registration.
    pub fn reset(&mut self, id: TimerId) {
        match self.entry_mut(id) {
            Some(entry) => entry.behavior.rewind(),
            None => warn!(?id, "reset on stale timer handle"),
        }
    }

    /// Mark a timer as long-lived: on completion it rewinds to a paused,
    /// zeroed state instead of being recycled.
    pub fn set_keep_on_complete(&mut self, id: TimerId, keep: bool) {
        match self.entry_mut(id) {
            Some(entry) => entry.keep_on_complete = keep,
            None => warn!(?id, "set_keep_on_complete on stale timer handle"),
        }
    }

    pub fn set_delta_source(&mut self, id: TimerId, source: DeltaSource) {
        match self.entry_mut(id) {
            Some(entry) => entry.source = source,
            None => warn!(?id, "set_delta_source on stale timer handle"),
        }
    }

    /// Whether the handle still refers to a live timer.
    pub fn is_active(&self, id: TimerId) -> bool {
        self.entry(id).is_some()
    }

    pub fn is_paused(&self, id: TimerId) -> bool {
        self.entry(id).is_some_and(|entry| entry.paused)
    }

    /// Time remaining until the timer's next fire, if the handle is live.
    pub fn time_left(&self, id: TimerId) -> Option<f32> {
        self.entry(id).map(|entry| entry.behavior.time_left())
    }

    /// Number of times the timer has fired, if the handle is live.
    pub fn elapsed_cycles(&self, id: TimerId) -> Option<u32> {
        self.entry(id).map(|entry| entry.behavior.elapsed_cycles())
    }

    /// Total time fed to the timer since creation, if the handle is live.
    pub fn total_time_active(&self, id: TimerId) -> Option<f32> {
        self.entry(id).map(|entry| entry.behavior.total_time_active())
    }

    /// Read-only occupancy snapshot, pollable at any time.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            free_timers: self.free.len(),
            working_timers: self.working.len(),
            total_timers: self.slots.len(),
        }
    }

    /// Behavior instances of `kind` ever allocated.
    pub fn behaviors_allocated(&self, kind: BehaviorKind) -> usize {
        self.behaviors.allocated(kind)
    }

    /// Behavior instances of `kind` currently awaiting reuse.
    pub fn behaviors_pooled(&self, kind: BehaviorKind) -> usize {
        self.behaviors.pooled(kind)
    }

    fn entry(&self, id: TimerId) -> Option<&TimerEntry> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: TimerId) -> Option<&mut TimerEntry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn release(&mut self, id: TimerId) {
        let slot = &mut self.slots[id.index as usize];
        let entry = slot.entry.take();
        // Bumping the generation invalidates every outstanding copy of this
        // handle before the slot is handed out again.
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(entry) = entry {
            self.behaviors.release(entry.behavior);
        }
        self.free.push(id.index);
        self.working.retain(|worked| *worked != id);
    }

    fn apply(&mut self, op: TimerOp) {
        match op {
            TimerOp::Pause(id) => self.pause(id),
            TimerOp::Unpause(id) => self.unpause(id),
            TimerOp::Reset(id) => self.reset(id),
            TimerOp::Destroy(id) => self.destroy(id),
            TimerOp::Spawn(spawn) => {
                self.spawn(spawn.kind, spawn.interval, spawn.callback);
            }
        }
    }
}
