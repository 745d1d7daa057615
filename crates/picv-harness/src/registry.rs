//! Write-once registry of role-thread kernel identities.
//!
//! Each role records its own tid into its slot exactly once, before its
//! first blocking call; the orchestrator snapshots the registry during
//! forced shutdown to target kicks. One slot per logical thread index, so
//! there is never write contention.

use std::sync::OnceLock;

use picv_core::Tid;

pub struct ThreadRegistry {
    slots: Box<[OnceLock<Tid>]>,
}

impl ThreadRegistry {
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let mut slots = Vec::with_capacity(threads);
        slots.resize_with(threads, OnceLock::new);
        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record the calling thread's identity for `slot`.
    ///
    /// # Panics
    ///
    /// Panics if the slot was already recorded — two threads claiming one
    /// logical index is a harness bug, not a runtime condition.
    pub fn record(&self, slot: usize, tid: Tid) {
        self.slots[slot]
            .set(tid)
            .unwrap_or_else(|_| panic!("thread slot {slot} recorded twice"));
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<Tid> {
        self.slots.get(slot).and_then(|s| s.get().copied())
    }

    /// All identities recorded so far, in slot order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Tid> {
        self.slots.iter().filter_map(|s| s.get().copied()).collect()
    }
}
