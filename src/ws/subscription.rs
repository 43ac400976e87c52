//! Per-observer subscription filter.
//!
//! Tracks which machines a presentation client follows and decides which
//! fleet events it receives.

use std::collections::HashSet;

use crate::domain::{FleetEvent, MachineId};

/// Machine subscriptions for a single WebSocket observer.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    machine_ids: HashSet<MachineId>,
    /// Wildcard `"*"`; also the only way to see events not tied to a machine.
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates an empty manager that matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds machines to the set. `wildcard` enables `"*"`.
    pub fn subscribe(&mut self, ids: &[MachineId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.machine_ids.extend(ids.iter().copied());
    }

    /// Removes machines from the set. The wildcard is left as is.
    pub fn unsubscribe(&mut self, ids: &[MachineId]) {
        for id in ids {
            self.machine_ids.remove(id);
        }
    }

    /// Returns `true` if the event should be forwarded to this observer.
    #[must_use]
    pub fn matches(&self, event: &FleetEvent) -> bool {
        if self.subscribe_all {
            return true;
        }
        event
            .machine_id()
            .is_some_and(|id| self.machine_ids.contains(&id))
    }

    /// Number of explicitly followed machines.
    #[must_use]
    pub fn count(&self) -> usize {
        self.machine_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
