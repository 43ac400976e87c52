//! WebSocket message types for presentation observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::MachineId;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a server-originated message stamped now.
    #[must_use]
    pub fn new(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(id: String, code: u32, message: impl Into<String>) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message.into() }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// One entry of a subscription list: a machine id or the `"*"` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionTarget {
    /// A specific machine.
    Machine(MachineId),
    /// Any string; only `"*"` has meaning.
    Pattern(String),
}

impl SubscriptionTarget {
    /// Returns `true` for the `"*"` wildcard.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Pattern(p) if p == "*")
    }
}

/// Commands a presentation client can send, carried in the envelope payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Receive events for these machines. `"*"` receives everything.
    Subscribe {
        /// Machine ids or `"*"`.
        machine_ids: Vec<SubscriptionTarget>,
    },
    /// Stop receiving events for these machines.
    Unsubscribe {
        /// Machine ids.
        machine_ids: Vec<MachineId>,
    },
    /// Request the current fleet view.
    Snapshot,
    /// Open a connection for one more machine.
    AddMachine,
    /// Pause or resume a machine.
    TogglePause {
        /// Target machine.
        machine_id: MachineId,
    },
    /// Remove a machine (always rejected).
    RemoveMachine {
        /// Target machine.
        machine_id: MachineId,
    },
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_accepts_ids_and_wildcard() {
        let payload = serde_json::json!({"command": "subscribe", "machine_ids": [1, "*", 7]});
        let Ok(WsCommand::Subscribe { machine_ids }) = serde_json::from_value(payload) else {
            panic!("expected subscribe");
        };
        assert_eq!(machine_ids.len(), 3);
        assert_eq!(
            machine_ids.first(),
            Some(&SubscriptionTarget::Machine(MachineId::new(1)))
        );
        assert!(machine_ids.get(1).is_some_and(SubscriptionTarget::is_wildcard));
    }

    #[test]
    fn toggle_pause_parses() {
        let payload = serde_json::json!({"command": "toggle_pause", "machine_id": 4});
        let Ok(WsCommand::TogglePause { machine_id }) = serde_json::from_value(payload) else {
            panic!("expected toggle_pause");
        };
        assert_eq!(machine_id, MachineId::new(4));
    }

    #[test]
    fn unknown_command_fails() {
        let payload = serde_json::json!({"command": "teleport"});
        assert!(serde_json::from_value::<WsCommand>(payload).is_err());
    }

    #[test]
    fn error_envelope_shape() {
        let Ok(json) = serde_json::to_value(WsMessage::error("x".to_string(), 400, "bad")) else {
            panic!("serialization failed");
        };
        assert_eq!(json["type"], "error");
        assert_eq!(json["payload"]["code"], 400);
    }
}
