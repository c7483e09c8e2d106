//! Free lists of recycled behavior instances, keyed by kind.

use std::collections::HashMap;

use crate::behavior::{Behavior, BehaviorKind};

/// Recycles behavior instances so timer churn settles into a steady state
/// with no new allocations.
#[derive(Default)]
pub(crate) struct BehaviorPool {
    free: HashMap<BehaviorKind, Vec<Box<Behavior>>>,
    allocated: HashMap<BehaviorKind, usize>,
}

impl BehaviorPool {
    /// Take a pooled instance of `kind`, or allocate a fresh one.
    pub fn acquire(&mut self, kind: BehaviorKind) -> Box<Behavior> {
        if let Some(behavior) = self.free.get_mut(&kind).and_then(|list| list.pop()) {
            return behavior;
        }
        *self.allocated.entry(kind).or_insert(0) += 1;
        Box::new(Behavior::new(kind))
    }

    /// Scrub an instance and return it to its kind's free list.
    pub fn release(&mut self, mut behavior: Box<Behavior>) {
        behavior.reset_for_pool();
        self.free.entry(behavior.kind()).or_default().push(behavior);
    }

    /// Number of instances of `kind` ever allocated.
    pub fn allocated(&self, kind: BehaviorKind) -> usize {
        self.allocated.get(&kind).copied().unwrap_or(0)
    }

    /// Number of instances of `kind` currently in the free list.
    pub fn pooled(&self, kind: BehaviorKind) -> usize {
        self.free.get(&kind).map(Vec::len).unwrap_or(0)
    }
}
