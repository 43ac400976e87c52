//! Service layer: the fleet event loop and its handle.
//!
//! [`FleetService`] owns the fleet store and connection registry and runs
//! every callback and operator intent on one task. [`FleetHandle`] is the
//! cloneable way in for the presentation bridge.

pub mod fleet_service;

pub use fleet_service::{FleetHandle, FleetService};
