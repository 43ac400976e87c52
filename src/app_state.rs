//! Shared application state injected into all Axum handlers.

use crate::domain::EventBus;
use crate::service::FleetHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Entry point into the fleet event loop.
    pub fleet: FleetHandle,
    /// Event bus for WebSocket observers.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds the state from a fleet handle, sharing its event bus.
    #[must_use]
    pub fn new(fleet: FleetHandle) -> Self {
        let event_bus = fleet.event_bus().clone();
        Self { fleet, event_bus }
    }
}
