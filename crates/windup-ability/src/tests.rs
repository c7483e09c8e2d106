//! Tests for the ability state machine: cast/cooldown lifecycles under both
//! cooldown policies, cancellation, locking, and timer reuse.
//!
//! Tick deltas are dyadic fractions so f32 accumulation is exact; a timer
//! fires on the first tick that pushes it strictly past its duration.

use std::cell::Cell;
use std::rc::Rc;

use windup_timers::{BehaviorKind, TimerScheduler};

use crate::ability::{Ability, AbilityConfig, AbilityError, CooldownPolicy};

fn config(name: &str, cooldown_time: f32, cast_time: f32, policy: CooldownPolicy) -> AbilityConfig {
    AbilityConfig {
        name: name.to_string(),
        cooldown_time,
        cast_time,
        policy,
    }
}

fn hook(count: &Rc<Cell<u32>>) -> impl FnMut() + 'static {
    let count = Rc::clone(count);
    move || count.set(count.get() + 1)
}

// ---- Construction ----

#[test]
fn test_non_positive_cooldown_rejected() {
    for bad in [0.0, -1.0] {
        let result = Ability::new(config("strike", bad, 0.0, CooldownPolicy::FromCastStart), || {});
        assert!(matches!(
            result,
            Err(AbilityError::NonPositiveCooldown { .. })
        ));
    }
}

#[test]
fn test_negative_cast_time_rejected() {
    let result = Ability::new(config("strike", 1.0, -0.5, CooldownPolicy::FromCastStart), || {});
    assert!(matches!(result, Err(AbilityError::NegativeCastTime { .. })));
}

#[test]
fn test_config_serde_with_defaults() {
    let json = r#"{"name":"fireball","cooldown_time":8.0}"#;
    let config: AbilityConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.cast_time, 0.0);
    assert_eq!(config.policy, CooldownPolicy::FromCastStart);

    let json = serde_json::to_string(&config).unwrap();
    let back: AbilityConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, "fireball");
    assert_eq!(back.cooldown_time, 8.0);
}

// ---- Instant abilities (no cast phase) ----

#[test]
fn test_instant_use_activates_synchronously() {
    let mut timers = TimerScheduler::new();
    let activations = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("blink", 2.0, 0.0, CooldownPolicy::FromCastStart),
        hook(&activations),
    )
    .unwrap();

    assert!(ability.try_use(&mut timers));
    // No tick needed: the activation ran inside try_use.
    assert_eq!(activations.get(), 1);
    assert!(ability.on_cooldown());
    assert!(!ability.is_casting());
}

#[test]
fn test_use_fails_on_cooldown_then_recovers() {
    let mut timers = TimerScheduler::new();
    let activations = Rc::new(Cell::new(0));
    let off_cooldown = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("blink", 2.0, 0.0, CooldownPolicy::FromCastStart),
        hook(&activations),
    )
    .unwrap();
    ability.on_off_cooldown(hook(&off_cooldown));

    assert!(ability.try_use(&mut timers));
    assert!(!ability.try_use(&mut timers));

    for _ in 0..4 {
        timers.tick(0.5, 0.0); // 2.0 accumulated, boundary not yet crossed
    }
    assert!(ability.on_cooldown());
    assert_eq!(off_cooldown.get(), 0);

    timers.tick(0.5, 0.0); // 2.5 > 2.0
    assert_eq!(off_cooldown.get(), 1);
    assert!(!ability.on_cooldown());
    assert!(ability.try_use(&mut timers));
    assert_eq!(activations.get(), 2);
}

#[test]
fn test_cooldown_left_polling() {
    let mut timers = TimerScheduler::new();
    let mut ability = Ability::new(
        config("blink", 2.0, 0.0, CooldownPolicy::FromCastStart),
        || {},
    )
    .unwrap();

    assert_eq!(ability.cooldown_left(&timers), 0.0);
    ability.try_use(&mut timers);
    assert_eq!(ability.cooldown_left(&timers), 2.0);

    timers.tick(0.5, 0.0);
    timers.tick(0.5, 0.0);
    assert_eq!(ability.cooldown_left(&timers), 1.0);

    for _ in 0..3 {
        timers.tick(0.5, 0.0);
    }
    assert_eq!(ability.cooldown_left(&timers), 0.0);
}

// ---- Cast phase, cooldown from cast point ----

#[test]
fn test_from_cast_point_lifecycle() {
    let mut timers = TimerScheduler::new();
    let activations = Rc::new(Cell::new(0));
    let started = Rc::new(Cell::new(0));
    let off_cooldown = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("fireball", 2.0, 1.0, CooldownPolicy::FromCastPoint),
        hook(&activations),
    )
    .unwrap();
    ability.on_start(hook(&started));
    ability.on_off_cooldown(hook(&off_cooldown));

    assert!(ability.try_use(&mut timers));
    assert_eq!(started.get(), 1);
    assert!(ability.is_casting());
    assert!(!ability.on_cooldown());
    assert_eq!(ability.cooldown_left(&timers), 0.0);

    timers.tick(0.5, 0.0);
    timers.tick(0.5, 0.0); // cast at exactly 1.0: boundary not crossed
    assert_eq!(activations.get(), 0);
    assert!(ability.is_casting());

    timers.tick(0.5, 0.0); // cast fires; cooldown unpaused after the pass
    assert_eq!(activations.get(), 1);
    assert!(!ability.is_casting());
    assert!(ability.on_cooldown());

    for _ in 0..4 {
        timers.tick(0.5, 0.0); // cooldown reaches exactly 2.0
    }
    assert!(ability.on_cooldown());
    assert_eq!(off_cooldown.get(), 0);

    timers.tick(0.5, 0.0);
    assert_eq!(off_cooldown.get(), 1);
    assert!(!ability.on_cooldown());
    assert!(ability.is_ready());
}

#[test]
fn test_second_use_mid_cast_is_blocked() {
    let mut timers = TimerScheduler::new();
    let started = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("fireball", 2.0, 1.0, CooldownPolicy::FromCastPoint),
        || {},
    )
    .unwrap();
    ability.on_start(hook(&started));

    assert!(ability.try_use(&mut timers));
    // With cooldown-from-cast-point the cooldown flag is still clear here;
    // the casting flag alone must reject the second attempt.
    timers.tick(0.5, 0.0);
    assert!(!ability.on_cooldown());
    assert!(!ability.try_use(&mut timers));
    assert_eq!(started.get(), 1);
}

// ---- Cast phase, cooldown from cast start ----

#[test]
fn test_from_cast_start_lifecycle() {
    let mut timers = TimerScheduler::new();
    let activations = Rc::new(Cell::new(0));
    let off_cooldown = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("barrage", 2.0, 1.0, CooldownPolicy::FromCastStart),
        hook(&activations),
    )
    .unwrap();
    ability.on_off_cooldown(hook(&off_cooldown));

    assert!(ability.try_use(&mut timers));
    // Cooldown starts with the cast, covering cast + cooldown.
    assert!(ability.on_cooldown());
    assert!(ability.is_casting());
    assert_eq!(ability.cooldown_left(&timers), 3.0);

    timers.tick(0.5, 0.0);
    assert!(!ability.try_use(&mut timers));

    timers.tick(0.5, 0.0);
    timers.tick(0.5, 0.0); // cast fires at 1.5
    assert_eq!(activations.get(), 1);
    assert!(!ability.is_casting());
    assert!(ability.on_cooldown());

    for _ in 0..3 {
        timers.tick(0.5, 0.0); // cooldown reaches exactly 3.0
    }
    assert_eq!(off_cooldown.get(), 0);
    timers.tick(0.5, 0.0);
    assert_eq!(off_cooldown.get(), 1);
    assert!(ability.is_ready());
}

// ---- Cancellation ----

#[test]
fn test_cancel_cast_suppresses_activation_but_not_cooldown() {
    let mut timers = TimerScheduler::new();
    let activations = Rc::new(Cell::new(0));
    let cancels = Rc::new(Cell::new(0));
    let off_cooldown = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("barrage", 2.0, 1.0, CooldownPolicy::FromCastStart),
        hook(&activations),
    )
    .unwrap();
    ability.on_cancel(hook(&cancels));
    ability.on_off_cooldown(hook(&off_cooldown));

    ability.try_use(&mut timers);
    timers.tick(0.5, 0.0);
    ability.cancel_cast(&mut timers);
    assert_eq!(cancels.get(), 1);
    assert!(!ability.is_casting());
    assert!(ability.on_cooldown(), "started cooldown keeps counting");

    // Run the full cooldown out: the activation never fires.
    for _ in 0..7 {
        timers.tick(0.5, 0.0);
    }
    assert_eq!(activations.get(), 0);
    assert_eq!(off_cooldown.get(), 1);

    // The next use restarts the cast from zero.
    assert!(ability.try_use(&mut timers));
    timers.tick(0.5, 0.0);
    timers.tick(0.5, 0.0);
    assert_eq!(activations.get(), 0);
    timers.tick(0.5, 0.0);
    assert_eq!(activations.get(), 1);
}

#[test]
fn test_cancel_cast_from_cast_point_allows_immediate_reuse() {
    let mut timers = TimerScheduler::new();
    let mut ability = Ability::new(
        config("fireball", 2.0, 1.0, CooldownPolicy::FromCastPoint),
        || {},
    )
    .unwrap();

    ability.try_use(&mut timers);
    timers.tick(0.5, 0.0);
    ability.cancel_cast(&mut timers);
    // Cooldown never started, so nothing gates the retry.
    assert!(!ability.on_cooldown());
    assert!(ability.try_use(&mut timers));
}

#[test]
fn test_cancel_when_not_casting_is_noop() {
    let mut timers = TimerScheduler::new();
    let cancels = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("fireball", 2.0, 1.0, CooldownPolicy::FromCastPoint),
        || {},
    )
    .unwrap();
    ability.on_cancel(hook(&cancels));

    ability.cancel_cast(&mut timers);
    assert_eq!(cancels.get(), 0);
}

// ---- Forced cooldown ----

#[test]
fn test_put_on_cooldown_before_first_use_is_noop() {
    let mut timers = TimerScheduler::new();
    let mut ability = Ability::new(
        config("fireball", 2.0, 1.0, CooldownPolicy::FromCastPoint),
        || {},
    )
    .unwrap();

    ability.put_on_cooldown(&mut timers);
    assert!(!ability.on_cooldown());
    assert!(ability.try_use(&mut timers));
}

#[test]
fn test_put_on_cooldown_interrupts_cast() {
    let mut timers = TimerScheduler::new();
    let mut ability = Ability::new(
        config("fireball", 2.0, 1.0, CooldownPolicy::FromCastPoint),
        || {},
    )
    .unwrap();

    ability.try_use(&mut timers);
    timers.tick(0.5, 0.0);
    // External interrupt (e.g. a stun) skips straight to the cooldown.
    ability.put_on_cooldown(&mut timers);
    assert!(ability.on_cooldown());
    assert!(!ability.try_use(&mut timers));
}

#[test]
fn test_put_on_cooldown_while_on_cooldown_is_noop() {
    let mut timers = TimerScheduler::new();
    let mut ability = Ability::new(
        config("blink", 2.0, 0.0, CooldownPolicy::FromCastStart),
        || {},
    )
    .unwrap();

    ability.try_use(&mut timers);
    timers.tick(0.5, 0.0);
    let left = ability.cooldown_left(&timers);
    ability.put_on_cooldown(&mut timers);
    // The running cooldown is not restarted.
    assert_eq!(ability.cooldown_left(&timers), left);
}

// ---- Locking ----

#[test]
fn test_locked_blocks_use_without_touching_other_state() {
    let mut timers = TimerScheduler::new();
    let off_cooldown = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("blink", 2.0, 0.0, CooldownPolicy::FromCastStart),
        || {},
    )
    .unwrap();
    ability.on_off_cooldown(hook(&off_cooldown));

    ability.set_locked(true);
    assert!(!ability.try_use(&mut timers));
    ability.set_locked(false);
    assert!(ability.try_use(&mut timers));

    // Locking mid-cooldown does not stop the cooldown clock.
    ability.set_locked(true);
    for _ in 0..5 {
        timers.tick(0.5, 0.0);
    }
    assert_eq!(off_cooldown.get(), 1);
    assert!(!ability.on_cooldown());
    // Still locked: ready state is irrelevant until unlocked.
    assert!(!ability.try_use(&mut timers));
    ability.set_locked(false);
    assert!(ability.try_use(&mut timers));
}

// ---- Events ----

#[test]
fn test_on_start_fires_only_on_successful_use() {
    let mut timers = TimerScheduler::new();
    let started = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("blink", 2.0, 0.0, CooldownPolicy::FromCastStart),
        || {},
    )
    .unwrap();
    ability.on_start(hook(&started));

    assert!(ability.try_use(&mut timers));
    assert!(!ability.try_use(&mut timers));
    assert!(!ability.try_use(&mut timers));
    assert_eq!(started.get(), 1);
}

// ---- Timer reuse ----

#[test]
fn test_timers_survive_across_activations() {
    let mut timers = TimerScheduler::new();
    let activations = Rc::new(Cell::new(0));
    let mut ability = Ability::new(
        config("fireball", 2.0, 1.0, CooldownPolicy::FromCastPoint),
        hook(&activations),
    )
    .unwrap();

    for cycle in 1..=3 {
        assert!(ability.try_use(&mut timers), "cycle {cycle}");
        // 1.5s of cast window, then 2.5s of cooldown window.
        for _ in 0..8 {
            timers.tick(0.5, 0.0);
        }
        assert_eq!(activations.get(), cycle);
        assert!(ability.is_ready());
    }

    // One cast timer and one cooldown timer, ever; both stay registered.
    assert_eq!(timers.behaviors_allocated(BehaviorKind::Countdown), 2);
    let stats = timers.stats();
    assert_eq!(stats.total_timers, 2);
    assert_eq!(stats.working_timers, 2);
}

#[test]
fn test_destroy_releases_timers_and_allows_recreation() {
    let mut timers = TimerScheduler::new();
    let mut ability = Ability::new(
        config("fireball", 2.0, 1.0, CooldownPolicy::FromCastPoint),
        || {},
    )
    .unwrap();

    ability.try_use(&mut timers);
    ability.destroy(&mut timers);
    let stats = timers.stats();
    assert_eq!(stats.working_timers, 0);
    assert_eq!(stats.free_timers, 2);
    assert!(!ability.on_cooldown());
    assert!(!ability.is_casting());

    // Reusable after destroy: timers come back out of the pool.
    assert!(ability.try_use(&mut timers));
    assert_eq!(timers.behaviors_allocated(BehaviorKind::Countdown), 2);
    assert_eq!(timers.stats().working_timers, 2);
}
