//! Cast/cooldown ability state machine built on `windup-timers`.
//!
//! An [`Ability`] gates a "usable action" behind a cast delay and a
//! cooldown, each driven by its own pooled timer. The host creates one
//! ability per action, subscribes its notification hooks, and calls
//! [`Ability::try_use`] when the player triggers the action.

pub mod ability;

pub use ability::{Ability, AbilityConfig, AbilityError, CooldownPolicy};

#[cfg(test)]
mod tests;
