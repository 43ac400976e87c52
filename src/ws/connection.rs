//! Read/write loop for one presentation observer.
//!
//! Forwards fleet events that match the observer's subscriptions and
//! dispatches its commands to the fleet event loop.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{SubscriptionTarget, WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{FleetEvent, Machine, MachineId};
use crate::service::FleetHandle;

/// Runs the read/write loop for a single observer socket.
///
/// The observer receives the current fleet view on connect, then only the
/// events it subscribed to.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<FleetEvent>,
    fleet: FleetHandle,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    if let Some(json) = encode(&snapshot_message(&fleet, String::new()))
        && ws_tx.send(Message::text(json)).await.is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(text.as_str(), &mut subs, &fleet).await;
                        if let Some(json) = encode(&reply)
                            && ws_tx.send(Message::text(json)).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "ws observer read failed");
                        break;
                    }
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(fleet_event) => {
                        if !subs.matches(&fleet_event) {
                            continue;
                        }
                        let msg = WsMessage::new(
                            uuid::Uuid::new_v4().to_string(),
                            WsMessageType::Event,
                            serde_json::to_value(&fleet_event).unwrap_or_default(),
                        );
                        if let Some(json) = encode(&msg)
                            && ws_tx.send(Message::text(json)).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws observer lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws observer disconnected");
}

fn encode(msg: &WsMessage) -> Option<String> {
    serde_json::to_string(msg).ok()
}

fn snapshot_message(fleet: &FleetHandle, id: String) -> WsMessage {
    let machines: Vec<Machine> = fleet.snapshot().values().cloned().collect();
    WsMessage::new(
        id,
        WsMessageType::Event,
        serde_json::json!({
            "event_type": "snapshot",
            "count": machines.len(),
            "machines": machines,
        }),
    )
}

/// Handles one text frame from the observer and builds the reply.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    fleet: &FleetHandle,
) -> WsMessage {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(String::new(), 400, "malformed JSON");
    };
    let command = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(command) => command,
        Err(e) => return WsMessage::error(msg.id, 404, format!("unknown command: {e}")),
    };

    match command {
        WsCommand::Subscribe { machine_ids } => {
            let wildcard = machine_ids.iter().any(|t| t.is_wildcard());
            let ids: Vec<MachineId> = machine_ids
                .iter()
                .filter_map(|t| match t {
                    SubscriptionTarget::Machine(id) => Some(*id),
                    SubscriptionTarget::Pattern(_) => None,
                })
                .collect();
            subs.subscribe(&ids, wildcard);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": ids,
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { machine_ids } => {
            subs.unsubscribe(&machine_ids);
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": machine_ids,
                    "remaining_count": subs.count(),
                }),
            )
        }
        WsCommand::Snapshot => {
            let mut reply = snapshot_message(fleet, msg.id);
            reply.msg_type = WsMessageType::Response;
            reply
        }
        WsCommand::AddMachine => match fleet.add_machine().await {
            Ok(handle) => WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::to_value(&handle).unwrap_or_default(),
            ),
            Err(e) => WsMessage::error(msg.id, e.error_code(), e.to_string()),
        },
        WsCommand::TogglePause { machine_id } => match fleet.toggle_pause(machine_id).await {
            Ok(command) => WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({ "command": command, "status": "sent" }),
            ),
            Err(e) => WsMessage::error(msg.id, e.error_code(), e.to_string()),
        },
        WsCommand::RemoveMachine { machine_id } => match fleet.remove_machine(machine_id).await {
            Ok(()) => WsMessage::new(msg.id, WsMessageType::Response, serde_json::json!({})),
            Err(e) => WsMessage::error(msg.id, e.error_code(), e.to_string()),
        },
    }
}
