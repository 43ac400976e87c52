//! Observability events emitted by the fleet core.
//!
//! Every store write, connection transition and command outcome is published
//! as a [`FleetEvent`] through the [`super::EventBus`]. The WebSocket bridge
//! forwards them to presentation observers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{Command, ConnectionId, Machine, MachineId};
use crate::connection::ConnectionState;

/// Event emitted by the fleet core.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum FleetEvent {
    /// A machine entry was inserted or replaced.
    MachineUpdated {
        /// Connection that delivered the update.
        connection_id: ConnectionId,
        /// New authoritative value.
        machine: Machine,
        /// Time the update was applied.
        timestamp: DateTime<Utc>,
    },

    /// An anonymous connection learned which machine it carries.
    ConnectionBound {
        /// Connection identifier.
        connection_id: ConnectionId,
        /// Machine the connection now serves.
        machine_id: MachineId,
        /// Binding timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A connection moved between lifecycle states.
    ConnectionStateChanged {
        /// Connection identifier.
        connection_id: ConnectionId,
        /// Bound machine, if any.
        machine_id: Option<MachineId>,
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
        /// Transport-provided reason for errors.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An inbound frame could not be decoded and was dropped.
    DecodeFailed {
        /// Connection that delivered the frame.
        connection_id: ConnectionId,
        /// Decoder error message.
        reason: String,
        /// Time the frame was dropped.
        timestamp: DateTime<Utc>,
    },

    /// A command was written to a connection.
    CommandSent {
        /// Connection the command was written to.
        connection_id: ConnectionId,
        /// The command.
        command: Command,
        /// Send timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A command could not be delivered.
    CommandRejected {
        /// Target machine.
        machine_id: MachineId,
        /// Why delivery failed.
        reason: String,
        /// Rejection timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl FleetEvent {
    /// Returns the machine this event concerns, if known.
    #[must_use]
    pub fn machine_id(&self) -> Option<MachineId> {
        match self {
            Self::MachineUpdated { machine, .. } => Some(machine.id),
            Self::ConnectionBound { machine_id, .. } | Self::CommandRejected { machine_id, .. } => {
                Some(*machine_id)
            }
            Self::ConnectionStateChanged { machine_id, .. } => *machine_id,
            Self::CommandSent { command, .. } => Some(command.machine_id()),
            Self::DecodeFailed { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::MachineUpdated { .. } => "machine_updated",
            Self::ConnectionBound { .. } => "connection_bound",
            Self::ConnectionStateChanged { .. } => "connection_state_changed",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::CommandSent { .. } => "command_sent",
            Self::CommandRejected { .. } => "command_rejected",
        }
    }
}
