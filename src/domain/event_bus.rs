//! Broadcast channel for fleet events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. The fleet core
//! publishes a [`FleetEvent`] for every observable change, and each
//! presentation WebSocket subscribes to receive them.

use tokio::sync::broadcast;

use super::FleetEvent;

/// Broadcast bus for [`FleetEvent`]s.
///
/// When the ring buffer is full, the oldest events are dropped for lagging
/// receivers. Publishing never blocks the fleet event loop.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FleetEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event; `0` when
    /// nobody is listening.
    pub fn publish(&self, event: FleetEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
