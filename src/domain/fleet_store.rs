//! Fleet state store: last known [`Machine`] per [`MachineId`].
//!
//! The store is written only by the fleet service's event loop and is never
//! shared mutably. Readers get an immutable [`FleetSnapshot`]; the map is
//! copy-on-write, so a snapshot held by an observer is never mutated under it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::watch;

use super::{Machine, MachineId};

/// Immutable view of the whole fleet, ordered by machine id.
pub type FleetSnapshot = Arc<BTreeMap<MachineId, Machine>>;

/// Single source of truth for the last known state of every machine.
///
/// There is intentionally no removal operation.
#[derive(Debug)]
pub struct FleetStore {
    machines: FleetSnapshot,
    observers: watch::Sender<FleetSnapshot>,
}

impl FleetStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let machines: FleetSnapshot = Arc::new(BTreeMap::new());
        let (observers, _) = watch::channel(Arc::clone(&machines));
        Self {
            machines,
            observers,
        }
    }

    /// Inserts or replaces the entry for `machine.id` and notifies observers.
    ///
    /// Returns the value it replaced, if any. No range validation is applied.
    pub fn apply_update(&mut self, machine: Machine) -> Option<Machine> {
        let previous = Arc::make_mut(&mut self.machines).insert(machine.id, machine);
        self.observers.send_replace(Arc::clone(&self.machines));
        previous
    }

    /// Returns the current machine for `id`.
    #[must_use]
    pub fn get(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(&id)
    }

    /// Returns the full fleet as an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> FleetSnapshot {
        Arc::clone(&self.machines)
    }

    /// Returns a receiver that observes every new snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FleetSnapshot> {
        self.observers.subscribe()
    }

    /// Returns the number of known machines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    /// Returns `true` if no machine has reported yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Location;

    fn machine(id: u32, lat: f64, fuel_level: f64, is_paused: bool) -> Machine {
        Machine {
            id: MachineId::new(id),
            location: Location {
                lat,
                lon: -122.145161,
                alt: 3.0,
            },
            fuel_level,
            is_paused,
        }
    }

    #[test]
    fn read_after_write() {
        let mut store = FleetStore::new();
        let m = machine(7, 47.1, 55.5, false);
        assert!(store.apply_update(m.clone()).is_none());
        assert_eq!(store.get(MachineId::new(7)), Some(&m));
    }

    #[test]
    fn last_write_wins() {
        let mut store = FleetStore::new();
        let updates = [
            machine(1, 47.0, 100.0, true),
            machine(1, 47.1, 99.9, false),
            machine(1, 47.2, 99.8, false),
            machine(1, 46.9, 42.0, true),
        ];
        for m in &updates {
            store.apply_update(m.clone());
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(MachineId::new(1)), updates.last());
    }

    #[test]
    fn replace_returns_previous_value() {
        let mut store = FleetStore::new();
        let first = machine(2, 1.0, 10.0, false);
        store.apply_update(first.clone());
        let previous = store.apply_update(machine(2, 2.0, 9.0, true));
        assert_eq!(previous, Some(first));
    }

    #[test]
    fn get_unknown_is_none() {
        let store = FleetStore::new();
        assert!(store.get(MachineId::new(99)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let mut store = FleetStore::new();
        store.apply_update(machine(1, 1.0, 50.0, false));
        let snap = store.snapshot();

        store.apply_update(machine(1, 2.0, 40.0, true));
        store.apply_update(machine(2, 3.0, 30.0, false));

        assert_eq!(snap.len(), 1);
        let Some(old) = snap.get(&MachineId::new(1)) else {
            panic!("snapshot lost its entry");
        };
        assert!(!old.is_paused);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn observers_see_new_snapshot() {
        let mut store = FleetStore::new();
        let mut rx = store.subscribe();
        assert!(rx.borrow_and_update().is_empty());

        store.apply_update(machine(5, 1.0, 50.0, false));
        assert!(rx.has_changed().unwrap_or(false));
        assert!(rx.borrow_and_update().contains_key(&MachineId::new(5)));
    }
}
