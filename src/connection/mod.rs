//! Push connection layer: lifecycle state machine, transport, registry.
//!
//! One connection is opened per tracked machine. The [`ConnectionRegistry`]
//! owns them all, applies transport callbacks through the per-connection
//! [`ConnectionState`] machine, and routes operator commands to the
//! connection bound to the target machine.

pub mod registry;
pub mod state;
pub mod transport;

pub use registry::{ConnectionHandle, ConnectionRegistry, ConnectionScope, ConnectionSummary};
pub use state::{ConnectionState, Signal};
pub use transport::{
    OutboundFrame, Transport, TransportEnvelope, TransportEvent, TransportLink, WsTransport,
};

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory transport that records what the registry asks of it.

    use std::collections::HashMap;
    use std::sync::{Mutex, PoisonError};

    use tokio::sync::mpsc;

    use super::{OutboundFrame, Transport, TransportEnvelope, TransportLink};
    use crate::domain::ConnectionId;

    #[derive(Debug)]
    struct Recorded {
        endpoint: String,
        outbound: Option<mpsc::UnboundedReceiver<OutboundFrame>>,
        events: mpsc::UnboundedSender<TransportEnvelope>,
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        order: Mutex<Vec<ConnectionId>>,
        links: Mutex<HashMap<ConnectionId, Recorded>>,
    }

    impl RecordingTransport {
        /// Connection ids in the order they were opened.
        pub(crate) fn opened(&self) -> Vec<ConnectionId> {
            self.order
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub(crate) fn endpoint(&self, id: ConnectionId) -> Option<String> {
            self.links
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&id)
                .map(|r| r.endpoint.clone())
        }

        /// Frames the registry has written to `id` since the last drain.
        pub(crate) fn drain(&self, id: ConnectionId) -> Vec<OutboundFrame> {
            let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
            let mut frames = Vec::new();
            if let Some(rx) = links.get_mut(&id).and_then(|r| r.outbound.as_mut()) {
                while let Ok(frame) = rx.try_recv() {
                    frames.push(frame);
                }
            }
            frames
        }

        /// Simulates the transport task exiting without a callback.
        pub(crate) fn hang_up(&self, id: ConnectionId) {
            if let Some(r) = self
                .links
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_mut(&id)
            {
                r.outbound = None;
            }
        }

        /// Emits a lifecycle event as the transport for `id` would.
        pub(crate) fn emit(&self, id: ConnectionId, event: super::TransportEvent) -> bool {
            self.links
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&id)
                .is_some_and(|r| {
                    r.events
                        .send(TransportEnvelope {
                            connection_id: id,
                            event,
                        })
                        .is_ok()
                })
        }
    }

    impl Transport for RecordingTransport {
        fn connect(
            &self,
            connection_id: ConnectionId,
            endpoint: &str,
            events: mpsc::UnboundedSender<TransportEnvelope>,
        ) -> TransportLink {
            let (tx, rx) = mpsc::unbounded_channel();
            self.order
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(connection_id);
            self.links
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(
                    connection_id,
                    Recorded {
                        endpoint: endpoint.to_string(),
                        outbound: Some(rx),
                        events,
                    },
                );
            TransportLink::new(tx)
        }
    }
}
