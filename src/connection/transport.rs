//! Transport seam between the connection registry and the network.
//!
//! A [`Transport`] opens one push channel per call and reports its lifecycle
//! as [`TransportEvent`]s on a shared channel. The registry keeps only the
//! [`TransportLink`] it gets back, through which it writes commands and
//! requests teardown. [`WsTransport`] is the WebSocket implementation.

use std::fmt;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::domain::ConnectionId;

/// Lifecycle callback from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// A data frame arrived.
    Message(String),
    /// The transport failed. Always followed by [`TransportEvent::Closed`].
    Errored(String),
    /// The transport is gone.
    Closed,
}

/// A [`TransportEvent`] tagged with the connection it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    /// Originating connection.
    pub connection_id: ConnectionId,
    /// What happened.
    pub event: TransportEvent,
}

/// Frame written from the registry to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A text frame.
    Text(String),
    /// Close the transport.
    Close,
}

/// Write half of a connection, held by the registry.
#[derive(Debug, Clone)]
pub struct TransportLink {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl TransportLink {
    /// Wraps the sender side of a transport's outbound queue.
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { tx }
    }

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns the transport's reason if it no longer accepts frames.
    pub fn send_text(&self, text: String) -> Result<(), String> {
        self.tx
            .send(OutboundFrame::Text(text))
            .map_err(|_| "transport task has exited".to_string())
    }

    /// Asks the transport to close. Returns `false` if it is already gone.
    pub fn close(&self) -> bool {
        self.tx.send(OutboundFrame::Close).is_ok()
    }
}

/// Opens push channels.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Starts a connection to `endpoint` and returns immediately.
    ///
    /// Lifecycle events for `connection_id` must be sent on `events` in the
    /// order they happen, and must end with [`TransportEvent::Closed`].
    fn connect(
        &self,
        connection_id: ConnectionId,
        endpoint: &str,
        events: mpsc::UnboundedSender<TransportEnvelope>,
    ) -> TransportLink;
}

/// WebSocket transport backed by `tokio-tungstenite`.
///
/// Each connection runs on its own task; no timeout is applied to the
/// handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Creates the transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn connect(
        &self,
        connection_id: ConnectionId,
        endpoint: &str,
        events: mpsc::UnboundedSender<TransportEnvelope>,
    ) -> TransportLink {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(connection_id, endpoint.to_string(), rx, events));
        TransportLink::new(tx)
    }
}

/// Drives one WebSocket until either side closes it.
async fn run_socket(
    connection_id: ConnectionId,
    endpoint: String,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    events: mpsc::UnboundedSender<TransportEnvelope>,
) {
    let emit = |event: TransportEvent| {
        // The fleet loop may already be gone during shutdown.
        let _ = events.send(TransportEnvelope {
            connection_id,
            event,
        });
    };

    let connect = connect_async(endpoint.as_str());
    tokio::pin!(connect);

    let socket = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((socket, _)) => break socket,
                Err(e) => {
                    tracing::warn!(%connection_id, %endpoint, error = %e, "push connection failed");
                    emit(TransportEvent::Errored(e.to_string()));
                    emit(TransportEvent::Closed);
                    return;
                }
            },
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Text(_)) => {
                    tracing::debug!(%connection_id, "dropping frame queued before open");
                }
                Some(OutboundFrame::Close) | None => {
                    emit(TransportEvent::Closed);
                    return;
                }
            },
        }
    };

    tracing::debug!(%connection_id, %endpoint, "push connection open");
    emit(TransportEvent::Opened);

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    emit(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    emit(TransportEvent::Message(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    emit(TransportEvent::Errored(e.to_string()));
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Text(text)) => {
                    if let Err(e) = ws_tx.send(Message::text(text)).await {
                        emit(TransportEvent::Errored(e.to_string()));
                        break;
                    }
                }
                Some(OutboundFrame::Close) | None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    let _ = ws_tx.close().await;
                    break;
                }
            },
        }
    }

    tracing::debug!(%connection_id, "push connection closed");
    emit(TransportEvent::Closed);
}
