//! Connection registry: owns every push connection and routes traffic.
//!
//! The registry is driven from a single task. Inbound transport events are
//! applied with [`ConnectionRegistry::handle_transport_event`], which
//! decodes messages and forwards them to the [`FleetStore`]; operator
//! commands leave through [`ConnectionRegistry::send_command`].
//!
//! Connections are never evicted. A closed or errored connection stays in
//! the registry so that a later command against it fails with a clear
//! [`FleetError::ConnectionNotOpen`] rather than silently vanishing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use super::state::{ConnectionState, Signal};
use super::transport::{Transport, TransportEnvelope, TransportEvent, TransportLink};
use crate::domain::{Command, ConnectionId, EventBus, FleetEvent, FleetStore, Machine, MachineId};
use crate::error::FleetError;

/// Who opened a connection, and therefore who tears it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionScope {
    /// Opened when the owning view mounted; closed when it unmounts.
    Mount,
    /// Opened by "add machine"; lives until explicitly closed.
    Detached,
}

/// Returned by [`ConnectionRegistry::open_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConnectionHandle {
    /// New connection identifier.
    pub connection_id: ConnectionId,
    /// Scope the connection belongs to.
    pub scope: ConnectionScope,
    /// Always [`ConnectionState::Connecting`] at open time.
    pub state: ConnectionState,
}

/// Read-only view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConnectionSummary {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// Machine carried by this connection, once known.
    pub machine_id: Option<MachineId>,
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Scope the connection belongs to.
    pub scope: ConnectionScope,
    /// Time the connection was requested.
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Connection {
    scope: ConnectionScope,
    state: ConnectionState,
    machine_id: Option<MachineId>,
    link: TransportLink,
    opened_at: DateTime<Utc>,
}

/// Owner of all push connections.
///
/// `bindings` maps a machine id to the connection that first delivered it.
/// A binding is only replaced when the bound connection has reached a
/// terminal state and another connection delivers the same id.
#[derive(Debug)]
pub struct ConnectionRegistry {
    transport: Arc<dyn Transport>,
    endpoint: String,
    max_connections: Option<usize>,
    events_tx: mpsc::UnboundedSender<TransportEnvelope>,
    connections: HashMap<ConnectionId, Connection>,
    bindings: HashMap<MachineId, ConnectionId>,
    event_bus: EventBus,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    ///
    /// Every connection it opens reports lifecycle events on `events_tx`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: impl Into<String>,
        max_connections: Option<usize>,
        events_tx: mpsc::UnboundedSender<TransportEnvelope>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            max_connections,
            events_tx,
            connections: HashMap::new(),
            bindings: HashMap::new(),
            event_bus,
        }
    }

    /// Starts a new, independent connection to the push endpoint.
    ///
    /// Returns at once with the connection in `connecting`; the transition
    /// to `open` arrives later as a transport event.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ConnectionLimitReached`] if a cap is configured
    /// and that many connections are already live. Nothing is opened.
    pub fn open_connection(
        &mut self,
        scope: ConnectionScope,
    ) -> Result<ConnectionHandle, FleetError> {
        if let Some(limit) = self.max_connections
            && self.live_count() >= limit
        {
            tracing::warn!(limit, "connection limit reached");
            return Err(FleetError::ConnectionLimitReached { limit });
        }

        let connection_id = ConnectionId::new();
        let link = self
            .transport
            .connect(connection_id, &self.endpoint, self.events_tx.clone());
        self.connections.insert(
            connection_id,
            Connection {
                scope,
                state: ConnectionState::Connecting,
                machine_id: None,
                link,
                opened_at: Utc::now(),
            },
        );

        tracing::info!(%connection_id, ?scope, endpoint = %self.endpoint, "opening push connection");
        Ok(ConnectionHandle {
            connection_id,
            scope,
            state: ConnectionState::Connecting,
        })
    }

    /// Applies one transport callback.
    ///
    /// Never fails: malformed frames, unknown connections and out-of-order
    /// signals are logged and dropped without touching the store.
    pub fn handle_transport_event(&mut self, envelope: TransportEnvelope, store: &mut FleetStore) {
        let TransportEnvelope {
            connection_id,
            event,
        } = envelope;

        match event {
            TransportEvent::Opened => {
                self.transition(connection_id, Signal::Open, None);
            }
            TransportEvent::Message(text) => {
                if self.transition(connection_id, Signal::Message, None) {
                    self.ingest(connection_id, &text, store);
                }
            }
            TransportEvent::Errored(reason) => {
                tracing::warn!(%connection_id, %reason, "push connection error");
                self.transition(connection_id, Signal::Error, Some(reason));
            }
            TransportEvent::Closed => {
                self.transition(connection_id, Signal::Close, None);
            }
        }
    }

    /// Writes `command` to the connection bound to its machine.
    ///
    /// Never retries or queues, and never touches the fleet store: the
    /// machine's state only changes when the push source confirms it.
    ///
    /// # Errors
    ///
    /// - [`FleetError::NoConnection`] if no connection is bound to the id.
    /// - [`FleetError::ConnectionNotOpen`] if the bound connection is not open.
    /// - [`FleetError::DeliveryFailed`] if the transport refused the frame.
    pub fn send_command(&self, command: Command) -> Result<ConnectionId, FleetError> {
        let result = self.deliver(command);
        match &result {
            Ok(connection_id) => {
                tracing::info!(%connection_id, machine_id = %command.machine_id(), kind = command.kind_str(), "command sent");
                self.event_bus.publish(FleetEvent::CommandSent {
                    connection_id: *connection_id,
                    command,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                tracing::warn!(machine_id = %command.machine_id(), kind = command.kind_str(), error = %e, "command not delivered");
                self.event_bus.publish(FleetEvent::CommandRejected {
                    machine_id: command.machine_id(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
        result
    }

    /// Sends the command that flips the machine's pause state as currently
    /// known to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::MachineNotFound`] if the store has no entry for
    /// `machine_id`, or any error of [`Self::send_command`].
    pub fn toggle_pause(
        &self,
        machine_id: MachineId,
        store: &FleetStore,
    ) -> Result<Command, FleetError> {
        let machine = store
            .get(machine_id)
            .ok_or(FleetError::MachineNotFound(machine_id))?;
        let command = Command::toggle_for(machine);
        self.send_command(command)?;
        Ok(command)
    }

    /// Requests teardown of one connection.
    ///
    /// The connection moves to `closing`; the transport's close callback
    /// completes it.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ConnectionNotFound`] for an unknown id, or
    /// [`FleetError::InvalidTransition`] if the connection is already
    /// closing or terminal.
    pub fn close(&mut self, connection_id: ConnectionId) -> Result<(), FleetError> {
        let conn = self
            .connections
            .get_mut(&connection_id)
            .ok_or(FleetError::ConnectionNotFound(connection_id))?;
        let from = conn.state;
        conn.state = from.transition(Signal::LocalClose)?;
        if !conn.link.close() {
            tracing::debug!(%connection_id, "transport already gone");
        }
        let machine_id = conn.machine_id;
        let to = conn.state;
        self.publish_transition(connection_id, machine_id, from, to, None);
        Ok(())
    }

    /// Closes every connection opened with `scope`. Returns how many were
    /// asked to close.
    pub fn close_scope(&mut self, scope: ConnectionScope) -> usize {
        let ids: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, c)| c.scope == scope)
            .map(|(id, _)| *id)
            .collect();
        self.close_many(ids)
    }

    /// Closes every connection. Returns how many were asked to close.
    pub fn close_all(&mut self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        self.close_many(ids)
    }

    /// Returns a summary of every connection, open or not.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionSummary> {
        let mut list: Vec<ConnectionSummary> = self
            .connections
            .iter()
            .map(|(id, c)| summarize(*id, c))
            .collect();
        list.sort_by_key(|s| s.opened_at);
        list
    }

    /// Returns the connection with this id.
    #[must_use]
    pub fn connection(&self, connection_id: ConnectionId) -> Option<ConnectionSummary> {
        self.connections
            .get(&connection_id)
            .map(|c| summarize(connection_id, c))
    }

    /// Returns the connection currently bound to `machine_id`.
    #[must_use]
    pub fn connection_for(&self, machine_id: MachineId) -> Option<ConnectionSummary> {
        self.bindings
            .get(&machine_id)
            .and_then(|id| self.connection(*id))
    }

    /// Returns the number of connections ever opened and still tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no connection was ever opened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns the number of connections not in a terminal state.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| !c.state.is_terminal())
            .count()
    }

    fn close_many(&mut self, ids: Vec<ConnectionId>) -> usize {
        let mut closed = 0;
        for id in ids {
            let closable = self
                .connections
                .get(&id)
                .is_some_and(|c| c.state.next(Signal::LocalClose).is_some());
            if closable && self.close(id).is_ok() {
                closed += 1;
            }
        }
        closed
    }

    fn deliver(&self, command: Command) -> Result<ConnectionId, FleetError> {
        let machine_id = command.machine_id();
        let connection_id = *self
            .bindings
            .get(&machine_id)
            .ok_or(FleetError::NoConnection(machine_id))?;
        let conn = self
            .connections
            .get(&connection_id)
            .ok_or(FleetError::NoConnection(machine_id))?;
        if !conn.state.accepts_commands() {
            return Err(FleetError::ConnectionNotOpen {
                machine_id,
                state: conn.state,
            });
        }
        conn.link
            .send_text(command.encode()?)
            .map_err(|reason| FleetError::DeliveryFailed { machine_id, reason })?;
        Ok(connection_id)
    }

    /// Applies `signal` to a connection. Returns `false` if it was dropped.
    fn transition(
        &mut self,
        connection_id: ConnectionId,
        signal: Signal,
        reason: Option<String>,
    ) -> bool {
        let Some(conn) = self.connections.get_mut(&connection_id) else {
            tracing::warn!(%connection_id, %signal, "event for unknown connection");
            return false;
        };
        let from = conn.state;
        match from.transition(signal) {
            Ok(to) => {
                conn.state = to;
                let machine_id = conn.machine_id;
                if from != to {
                    tracing::info!(%connection_id, ?machine_id, %from, %to, "connection state changed");
                    self.publish_transition(connection_id, machine_id, from, to, reason);
                }
                true
            }
            Err(e) => {
                tracing::warn!(%connection_id, error = %e, "ignoring lifecycle signal");
                false
            }
        }
    }

    fn ingest(&mut self, connection_id: ConnectionId, text: &str, store: &mut FleetStore) {
        let machine = match Machine::decode(text) {
            Ok(machine) => machine,
            Err(e) => {
                tracing::warn!(%connection_id, error = %e, "dropping malformed message");
                self.event_bus.publish(FleetEvent::DecodeFailed {
                    connection_id,
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                return;
            }
        };

        self.bind(connection_id, machine.id);
        tracing::debug!(%connection_id, machine_id = %machine.id, "machine update");
        store.apply_update(machine.clone());
        self.event_bus.publish(FleetEvent::MachineUpdated {
            connection_id,
            machine,
            timestamp: Utc::now(),
        });
    }

    fn bind(&mut self, connection_id: ConnectionId, machine_id: MachineId) {
        if let Some(conn) = self.connections.get_mut(&connection_id)
            && conn.machine_id.is_none()
        {
            conn.machine_id = Some(machine_id);
        }

        let current = self.bindings.get(&machine_id).copied();
        let replace = match current {
            None => true,
            Some(existing) if existing == connection_id => false,
            Some(existing) => self
                .connections
                .get(&existing)
                .is_none_or(|c| c.state.is_terminal()),
        };
        if !replace {
            return;
        }

        self.bindings.insert(machine_id, connection_id);
        tracing::info!(%connection_id, %machine_id, "connection bound to machine");
        self.event_bus.publish(FleetEvent::ConnectionBound {
            connection_id,
            machine_id,
            timestamp: Utc::now(),
        });
    }

    fn publish_transition(
        &self,
        connection_id: ConnectionId,
        machine_id: Option<MachineId>,
        from: ConnectionState,
        to: ConnectionState,
        reason: Option<String>,
    ) {
        self.event_bus.publish(FleetEvent::ConnectionStateChanged {
            connection_id,
            machine_id,
            from,
            to,
            reason,
            timestamp: Utc::now(),
        });
    }
}

fn summarize(connection_id: ConnectionId, conn: &Connection) -> ConnectionSummary {
    ConnectionSummary {
        connection_id,
        machine_id: conn.machine_id,
        state: conn.state,
        scope: conn.scope,
        opened_at: conn.opened_at,
    }
}
