//! Domain layer: machine model, fleet store, commands and events.
//!
//! This module holds the value types exchanged with the push source, the
//! [`FleetStore`] that reconciles them into a fleet view, and the
//! [`EventBus`] that reports every change to observers.

pub mod command;
pub mod connection_id;
pub mod event_bus;
pub mod fleet_event;
pub mod fleet_store;
pub mod machine;

pub use command::Command;
pub use connection_id::ConnectionId;
pub use event_bus::EventBus;
pub use fleet_event::FleetEvent;
pub use fleet_store::{FleetSnapshot, FleetStore};
pub use machine::{Location, Machine, MachineId};
