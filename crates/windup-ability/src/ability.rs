//! The ability state machine: cast delay, cooldown, and the hooks between.
//!
//! An ability owns two long-lived timers. The cast timer counts the wind-up
//! from use to the actual activation; the cooldown timer counts the lockout
//! until the next use. Both are created lazily, marked keep-on-complete so
//! the scheduler rewinds them to a paused, zeroed state instead of
//! recycling, and re-armed across activations.
//!
//! Flag state is shared with the timer callbacks through `Rc<RefCell<_>>`;
//! the host loop is single-threaded, so there is no synchronization beyond
//! the borrow discipline.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use windup_timers::{TimerId, TimerScheduler};

/// When the cooldown clock starts counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CooldownPolicy {
    /// Cooldown runs from the moment of use, in parallel with the cast.
    /// The cooldown timer covers cast plus cooldown, so the ability is
    /// usable again `cast_time + cooldown_time` after use.
    #[default]
    FromCastStart,
    /// Cooldown starts only once the cast completes.
    FromCastPoint,
}

/// Data-driven ability definition. Durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityConfig {
    /// Diagnostic name, used in warnings.
    pub name: String,
    /// Lockout after activation. Must be positive.
    pub cooldown_time: f32,
    /// Wind-up between use and activation. Zero means the activation is
    /// immediate and synchronous.
    #[serde(default)]
    pub cast_time: f32,
    #[serde(default)]
    pub policy: CooldownPolicy,
}

/// Fatal configuration errors, surfaced at construction.
#[derive(Debug, Error)]
pub enum AbilityError {
    #[error("ability {name:?} has non-positive cooldown {cooldown_time}")]
    NonPositiveCooldown { name: String, cooldown_time: f32 },
    #[error("ability {name:?} has negative cast time {cast_time}")]
    NegativeCastTime { name: String, cast_time: f32 },
}

type Hook = Box<dyn FnMut()>;

/// State shared between the ability and its timer callbacks.
struct AbilityState {
    on_cooldown: bool,
    is_casting: bool,
    cooldown_timer: Option<TimerId>,
    on_activate: Hook,
    off_cooldown_hooks: Vec<Hook>,
}

/// A cast/cooldown-gated action controller.
///
/// Configuration is immutable after construction; to change durations at
/// runtime, build a new ability. The activation callback is required and
/// runs at the cast point (or synchronously on use when there is no cast
/// phase). The optional hooks fire in subscription order.
pub struct Ability {
    name: String,
    cooldown_time: f32,
    cast_time: f32,
    policy: CooldownPolicy,
    locked: bool,
    first_use: bool,
    cast_timer: Option<TimerId>,
    state: Rc<RefCell<AbilityState>>,
    start_hooks: Vec<Hook>,
    cancel_hooks: Vec<Hook>,
}

impl Ability {
    /// Build an ability from its config and required activation callback.
    pub fn new(config: AbilityConfig, on_activate: impl FnMut() + 'static) -> Result<Self, AbilityError> {
        if config.cooldown_time <= 0.0 {
            return Err(AbilityError::NonPositiveCooldown {
                name: config.name,
                cooldown_time: config.cooldown_time,
            });
        }
        if config.cast_time < 0.0 {
            return Err(AbilityError::NegativeCastTime {
                name: config.name,
                cast_time: config.cast_time,
            });
        }
        Ok(Self {
            name: config.name,
            cooldown_time: config.cooldown_time,
            cast_time: config.cast_time,
            policy: config.policy,
            locked: false,
            first_use: true,
            cast_timer: None,
            state: Rc::new(RefCell::new(AbilityState {
                on_cooldown: false,
                is_casting: false,
                cooldown_timer: None,
                on_activate: Box::new(on_activate),
                off_cooldown_hooks: Vec::new(),
            })),
            start_hooks: Vec::new(),
            cancel_hooks: Vec::new(),
        })
    }

    /// Subscribe to the moment a use is accepted, before any cast delay.
    pub fn on_start(&mut self, hook: impl FnMut() + 'static) {
        self.start_hooks.push(Box::new(hook));
    }

    /// Subscribe to explicit cast cancellation.
    pub fn on_cancel(&mut self, hook: impl FnMut() + 'static) {
        self.cancel_hooks.push(Box::new(hook));
    }

    /// Subscribe to the cooldown ending.
    pub fn on_off_cooldown(&mut self, hook: impl FnMut() + 'static) {
        self.state.borrow_mut().off_cooldown_hooks.push(Box::new(hook));
    }

    /// Attempt to activate. Returns `false` without side effects while the
    /// ability is locked, on cooldown, or still casting.
    pub fn try_use(&mut self, timers: &mut TimerScheduler) -> bool {
        if self.locked {
            return false;
        }
        {
            let state = self.state.borrow();
            if state.on_cooldown || state.is_casting {
                return false;
            }
        }
        self.activate(timers);
        true
    }

    fn activate(&mut self, timers: &mut TimerScheduler) {
        for hook in &mut self.start_hooks {
            hook();
        }

        if self.first_use {
            self.create_cooldown_timer(timers);
            self.first_use = false;
        }

        if self.has_cast_time() {
            self.state.borrow_mut().is_casting = true;
            if self.policy == CooldownPolicy::FromCastStart {
                self.put_on_cooldown(timers);
            }
            self.start_cast(timers);
        } else {
            {
                let mut state = self.state.borrow_mut();
                (state.on_activate)();
            }
            self.put_on_cooldown(timers);
        }
    }

    /// The cooldown timer outlives every activation: keep-on-complete
    /// rewinds it to paused/zero and the next use unpauses it again.
    fn create_cooldown_timer(&mut self, timers: &mut TimerScheduler) {
        let mut duration = self.cooldown_time;
        if self.has_cast_time() && self.policy == CooldownPolicy::FromCastStart {
            duration += self.cast_time;
        }

        let state = Rc::clone(&self.state);
        let id = timers.countdown(duration, move |_ctx| {
            let mut state = state.borrow_mut();
            state.on_cooldown = false;
            for hook in &mut state.off_cooldown_hooks {
                hook();
            }
        });
        timers.set_keep_on_complete(id, true);
        timers.pause(id);
        self.state.borrow_mut().cooldown_timer = Some(id);
    }

    fn start_cast(&mut self, timers: &mut TimerScheduler) {
        match self.cast_timer {
            Some(id) => timers.unpause(id),
            None => {
                let state = Rc::clone(&self.state);
                let policy = self.policy;
                let id = timers.countdown(self.cast_time, move |ctx| {
                    let mut state = state.borrow_mut();
                    state.is_casting = false;
                    (state.on_activate)();
                    if policy == CooldownPolicy::FromCastPoint {
                        state.on_cooldown = true;
                        if let Some(cooldown) = state.cooldown_timer {
                            // Deferred: the cooldown starts accumulating on
                            // the tick after the cast completes.
                            ctx.unpause(cooldown);
                        }
                    }
                });
                timers.set_keep_on_complete(id, true);
                self.cast_timer = Some(id);
            }
        }
    }

    /// Abort an in-progress cast: notifies cancel hooks and rewinds the
    /// cast timer to a paused, zeroed state. A cooldown already running
    /// under [`CooldownPolicy::FromCastStart`] keeps counting. No-op when
    /// not casting.
    pub fn cancel_cast(&mut self, timers: &mut TimerScheduler) {
        if !self.state.borrow().is_casting {
            return;
        }
        for hook in &mut self.cancel_hooks {
            hook();
        }
        self.state.borrow_mut().is_casting = false;
        if let Some(id) = self.cast_timer {
            timers.reset(id);
            timers.pause(id);
        }
    }

    /// Skip the cast and force-start the cooldown, for external interrupts
    /// like a stun. Warned no-op before the first use or while already on
    /// cooldown.
    pub fn put_on_cooldown(&mut self, timers: &mut TimerScheduler) {
        let mut state = self.state.borrow_mut();
        if self.first_use || state.on_cooldown {
            warn!(ability = %self.name, "put_on_cooldown: never used or already on cooldown");
            return;
        }
        state.on_cooldown = true;
        if let Some(id) = state.cooldown_timer {
            timers.unpause(id);
        }
    }

    /// Release both timers back to the scheduler's pool and clear all
    /// runtime state. The ability recreates its timers on the next use.
    pub fn destroy(&mut self, timers: &mut TimerScheduler) {
        if let Some(id) = self.cast_timer.take() {
            timers.destroy(id);
        }
        let mut state = self.state.borrow_mut();
        if let Some(id) = state.cooldown_timer.take() {
            timers.destroy(id);
        }
        state.on_cooldown = false;
        state.is_casting = false;
        drop(state);
        self.first_use = true;
    }

    /// Seconds of cooldown remaining; zero when off cooldown.
    pub fn cooldown_left(&self, timers: &TimerScheduler) -> f32 {
        let state = self.state.borrow();
        if !state.on_cooldown {
            return 0.0;
        }
        state
            .cooldown_timer
            .and_then(|id| timers.time_left(id))
            .unwrap_or(0.0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cooldown_time(&self) -> f32 {
        self.cooldown_time
    }

    pub fn cast_time(&self) -> f32 {
        self.cast_time
    }

    pub fn policy(&self) -> CooldownPolicy {
        self.policy
    }

    pub fn is_casting(&self) -> bool {
        self.state.borrow().is_casting
    }

    pub fn on_cooldown(&self) -> bool {
        self.state.borrow().on_cooldown
    }

    /// Whether a use right now would succeed.
    pub fn is_ready(&self) -> bool {
        if self.locked {
            return false;
        }
        let state = self.state.borrow();
        !state.on_cooldown && !state.is_casting
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Suspend the ability entirely (stun, silence, disable). Does not
    /// affect an in-progress cast or a running cooldown.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn has_cast_time(&self) -> bool {
        self.cast_time > 0.0
    }
}
