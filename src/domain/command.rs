//! Outbound operator commands.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Machine, MachineId};
use crate::error::FleetError;

/// Instruction sent to the push source for a single machine.
///
/// Serialized as `{"type": "pause" | "unpause", "id": <integer>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Stop the machine.
    Pause {
        /// Target machine.
        id: MachineId,
    },
    /// Resume the machine.
    Unpause {
        /// Target machine.
        id: MachineId,
    },
}

impl Command {
    /// Returns the command that flips the machine's known pause state.
    ///
    /// The local `Machine` is not modified; the push source confirms the
    /// change with its next update.
    #[must_use]
    pub const fn toggle_for(machine: &Machine) -> Self {
        if machine.is_paused {
            Self::Unpause { id: machine.id }
        } else {
            Self::Pause { id: machine.id }
        }
    }

    /// Returns the target machine.
    #[must_use]
    pub const fn machine_id(&self) -> MachineId {
        match self {
            Self::Pause { id } | Self::Unpause { id } => *id,
        }
    }

    /// Returns the wire discriminator.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Pause { .. } => "pause",
            Self::Unpause { .. } => "unpause",
        }
    }

    /// Encodes the command as an outbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Internal`] if serialization fails.
    pub fn encode(&self) -> Result<String, FleetError> {
        serde_json::to_string(self).map_err(|e| FleetError::Internal(e.to_string()))
    }
}
