//! Fleet service: the single event loop that owns the store and registry.
//!
//! All transport callbacks and operator intents are processed one at a time
//! by [`FleetService::run`]. Neither the [`FleetStore`] nor the
//! [`ConnectionRegistry`] is shared; other tasks reach them only through a
//! [`FleetHandle`], which sends intents over a channel and reads snapshots
//! from a `watch` receiver.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::MonitorConfig;
use crate::connection::{
    ConnectionHandle, ConnectionRegistry, ConnectionScope, ConnectionSummary, Transport,
    TransportEnvelope,
};
use crate::domain::{Command, ConnectionId, EventBus, FleetSnapshot, FleetStore, Machine, MachineId};
use crate::error::FleetError;

type Reply<T> = oneshot::Sender<Result<T, FleetError>>;

/// Operator intent routed into the event loop.
#[derive(Debug)]
enum Intent {
    AddMachine(Reply<ConnectionHandle>),
    TogglePause(MachineId, Reply<Command>),
    SendCommand(Command, Reply<ConnectionId>),
    RemoveMachine(MachineId, Reply<()>),
    CloseConnection(ConnectionId, Reply<()>),
    ListConnections(Reply<Vec<ConnectionSummary>>),
    Unmount(Reply<usize>),
    Shutdown(Reply<usize>),
}

/// Owner of the fleet core. Consumed by [`FleetService::run`].
#[derive(Debug)]
pub struct FleetService {
    store: FleetStore,
    registry: ConnectionRegistry,
    transport_rx: mpsc::UnboundedReceiver<TransportEnvelope>,
    intent_rx: mpsc::Receiver<Intent>,
    mount_connections: usize,
}

/// Cloneable entry point to a running [`FleetService`].
#[derive(Debug, Clone)]
pub struct FleetHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<FleetSnapshot>,
    event_bus: EventBus,
}

impl FleetService {
    /// Builds the service and its handle.
    ///
    /// Nothing is connected until [`FleetService::run`] is polled.
    #[must_use]
    pub fn new(
        config: &MonitorConfig,
        transport: Arc<dyn Transport>,
        event_bus: EventBus,
    ) -> (Self, FleetHandle) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (intent_tx, intent_rx) = mpsc::channel(config.intent_queue_capacity.max(1));

        let store = FleetStore::new();
        let snapshots = store.subscribe();
        let registry = ConnectionRegistry::new(
            transport,
            config.push_endpoint.clone(),
            config.max_connections,
            transport_tx,
            event_bus.clone(),
        );

        let service = Self {
            store,
            registry,
            transport_rx,
            intent_rx,
            mount_connections: config.mount_connections,
        };
        let handle = FleetHandle {
            intents: intent_tx,
            snapshots,
            event_bus,
        };
        (service, handle)
    }

    /// Runs the event loop until shutdown or until every handle is dropped.
    ///
    /// Opens the configured mount connections first. On exit every
    /// connection still alive is asked to close.
    pub async fn run(mut self) {
        for _ in 0..self.mount_connections {
            if let Err(e) = self.registry.open_connection(ConnectionScope::Mount) {
                tracing::warn!(error = %e, "mount connection not opened");
            }
        }
        tracing::info!(mount = self.mount_connections, "fleet service started");

        loop {
            tokio::select! {
                Some(envelope) = self.transport_rx.recv() => {
                    self.registry.handle_transport_event(envelope, &mut self.store);
                }
                intent = self.intent_rx.recv() => {
                    let Some(intent) = intent else {
                        let closed = self.registry.close_all();
                        tracing::info!(closed, "all fleet handles dropped; stopping");
                        break;
                    };
                    if !self.handle_intent(intent) {
                        break;
                    }
                }
            }
        }

        tracing::info!("fleet service stopped");
    }

    /// Applies one intent. Returns `false` when the loop should stop.
    fn handle_intent(&mut self, intent: Intent) -> bool {
        match intent {
            Intent::AddMachine(reply) => {
                let _ = reply.send(self.registry.open_connection(ConnectionScope::Detached));
            }
            Intent::TogglePause(machine_id, reply) => {
                let _ = reply.send(self.registry.toggle_pause(machine_id, &self.store));
            }
            Intent::SendCommand(command, reply) => {
                let _ = reply.send(self.registry.send_command(command));
            }
            Intent::RemoveMachine(machine_id, reply) => {
                tracing::warn!(%machine_id, "machine removal requested but not supported");
                let _ = reply.send(Err(FleetError::NotSupported(
                    "machine removal is not supported by the push source",
                )));
            }
            Intent::CloseConnection(connection_id, reply) => {
                let _ = reply.send(self.registry.close(connection_id));
            }
            Intent::ListConnections(reply) => {
                let _ = reply.send(Ok(self.registry.connections()));
            }
            Intent::Unmount(reply) => {
                let closed = self.registry.close_scope(ConnectionScope::Mount);
                tracing::info!(closed, "view unmounted");
                let _ = reply.send(Ok(closed));
            }
            Intent::Shutdown(reply) => {
                let closed = self.registry.close_all();
                tracing::info!(closed, "fleet service shutting down");
                let _ = reply.send(Ok(closed));
                return false;
            }
        }
        true
    }
}

impl FleetHandle {
    /// Opens a new long-lived connection for one more machine.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ConnectionLimitReached`] if capped, or
    /// [`FleetError::ServiceUnavailable`] if the loop has stopped.
    pub async fn add_machine(&self) -> Result<ConnectionHandle, FleetError> {
        self.request(Intent::AddMachine).await
    }

    /// Sends the pause or unpause command opposite to the machine's known
    /// state. The fleet view is unchanged until the push source confirms.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::MachineNotFound`] or a delivery failure.
    pub async fn toggle_pause(&self, machine_id: MachineId) -> Result<Command, FleetError> {
        self.request(|reply| Intent::TogglePause(machine_id, reply))
            .await
    }

    /// Sends an explicit command.
    ///
    /// # Errors
    ///
    /// Returns a delivery failure if no open connection is bound to the
    /// command's machine.
    pub async fn send_command(&self, command: Command) -> Result<ConnectionId, FleetError> {
        self.request(|reply| Intent::SendCommand(command, reply))
            .await
    }

    /// Machine removal. Always rejected.
    ///
    /// # Errors
    ///
    /// Always returns [`FleetError::NotSupported`] while the service runs.
    pub async fn remove_machine(&self, machine_id: MachineId) -> Result<(), FleetError> {
        self.request(|reply| Intent::RemoveMachine(machine_id, reply))
            .await
    }

    /// Requests teardown of one connection.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ConnectionNotFound`] or
    /// [`FleetError::InvalidTransition`] if already closing or terminal.
    pub async fn close_connection(&self, connection_id: ConnectionId) -> Result<(), FleetError> {
        self.request(|reply| Intent::CloseConnection(connection_id, reply))
            .await
    }

    /// Lists every connection the registry tracks.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ServiceUnavailable`] if the loop has stopped.
    pub async fn connections(&self) -> Result<Vec<ConnectionSummary>, FleetError> {
        self.request(Intent::ListConnections).await
    }

    /// Closes the connections opened at mount. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ServiceUnavailable`] if the loop has stopped.
    pub async fn unmount(&self) -> Result<usize, FleetError> {
        self.request(Intent::Unmount).await
    }

    /// Closes every connection and stops the loop. Returns how many
    /// connections were asked to close.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ServiceUnavailable`] if the loop already stopped.
    pub async fn shutdown(&self) -> Result<usize, FleetError> {
        self.request(Intent::Shutdown).await
    }

    /// Returns the current fleet view.
    #[must_use]
    pub fn snapshot(&self) -> FleetSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Returns the current value for one machine.
    #[must_use]
    pub fn machine(&self, machine_id: MachineId) -> Option<Machine> {
        self.snapshots.borrow().get(&machine_id).cloned()
    }

    /// Returns a receiver that observes every new fleet view.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<FleetSnapshot> {
        self.snapshots.clone()
    }

    /// Returns the event bus the core publishes on.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Intent) -> Result<T, FleetError> {
        let (reply, rx) = oneshot::channel();
        self.intents
            .send(make(reply))
            .await
            .map_err(|_| FleetError::ServiceUnavailable)?;
        rx.await.map_err(|_| FleetError::ServiceUnavailable)?
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::connection::TransportEvent;
    use crate::connection::test_support::RecordingTransport;
    use crate::connection::{ConnectionState, OutboundFrame};

    const SEVEN: &str = r#"{"id":7,"location":{"lat":47.1,"lon":-122.1,"alt":10},"fuel_level":55.5,"is_paused":false}"#;
    const SEVEN_PAUSED: &str = r#"{"id":7,"location":{"lat":47.1,"lon":-122.1,"alt":10},"fuel_level":55.5,"is_paused":true}"#;

    struct Running {
        transport: Arc<RecordingTransport>,
        handle: FleetHandle,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(config: MonitorConfig) -> Running {
        let transport = Arc::new(RecordingTransport::default());
        let (service, handle) = FleetService::new(
            &config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            EventBus::new(64),
        );
        let task = tokio::spawn(service.run());
        Running {
            transport,
            handle,
            task,
        }
    }

    async fn wait_for_machine(handle: &FleetHandle, id: u32, is_paused: bool) -> Machine {
        let mut rx = handle.watch();
        let waited = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|snap| {
                snap.get(&MachineId::new(id))
                    .is_some_and(|m| m.is_paused == is_paused)
            }),
        )
        .await;
        let Ok(Ok(snap)) = waited else {
            panic!("machine {id} never reached is_paused={is_paused}");
        };
        let Some(machine) = snap.get(&MachineId::new(id)).cloned() else {
            panic!("machine {id} missing");
        };
        machine
    }

    #[tokio::test]
    async fn pause_scenario_round_trip() {
        let rt = start(MonitorConfig::default());

        let Ok(handle) = rt.handle.add_machine().await else {
            panic!("add machine failed");
        };
        assert_eq!(handle.state, ConnectionState::Connecting);
        assert_eq!(handle.scope, ConnectionScope::Detached);
        let id = handle.connection_id;

        assert!(rt.transport.emit(id, TransportEvent::Opened));
        assert!(rt.transport.emit(id, TransportEvent::Message(SEVEN.to_string())));
        let machine = wait_for_machine(&rt.handle, 7, false).await;
        assert!((machine.fuel_level - 55.5).abs() < f64::EPSILON);

        let Ok(command) = rt.handle.toggle_pause(MachineId::new(7)).await else {
            panic!("toggle failed");
        };
        assert_eq!(
            command,
            Command::Pause {
                id: MachineId::new(7)
            }
        );
        assert_eq!(
            rt.transport.drain(id),
            vec![OutboundFrame::Text(r#"{"type":"pause","id":7}"#.to_string())]
        );
        assert_eq!(rt.handle.machine(MachineId::new(7)).map(|m| m.is_paused), Some(false));

        assert!(rt.transport.emit(id, TransportEvent::Message(SEVEN_PAUSED.to_string())));
        let machine = wait_for_machine(&rt.handle, 7, true).await;
        assert!(machine.is_paused);

        rt.task.abort();
    }

    #[tokio::test]
    async fn toggle_without_connection_reports_failure() {
        let rt = start(MonitorConfig::default());
        let result = rt.handle.toggle_pause(MachineId::new(3)).await;
        assert!(matches!(result, Err(FleetError::MachineNotFound(_))));

        let result = rt
            .handle
            .send_command(Command::Unpause {
                id: MachineId::new(3),
            })
            .await;
        assert!(result.is_err_and(|e| e.is_delivery_failure()));
        assert!(rt.handle.snapshot().is_empty());
        rt.task.abort();
    }

    #[tokio::test]
    async fn remove_is_always_rejected() {
        let rt = start(MonitorConfig::default());
        let result = rt.handle.remove_machine(MachineId::new(1)).await;
        assert!(matches!(result, Err(FleetError::NotSupported(_))));
        rt.task.abort();
    }

    #[tokio::test]
    async fn mount_connections_close_on_unmount() {
        let config = MonitorConfig {
            mount_connections: 2,
            ..MonitorConfig::default()
        };
        let rt = start(config);

        let Ok(added) = rt.handle.add_machine().await else {
            panic!("add machine failed");
        };
        let Ok(closed) = rt.handle.unmount().await else {
            panic!("unmount failed");
        };
        assert_eq!(closed, 2);

        let Ok(list) = rt.handle.connections().await else {
            panic!("list failed");
        };
        assert_eq!(list.len(), 3);
        for summary in &list {
            if summary.connection_id == added.connection_id {
                assert_eq!(summary.state, ConnectionState::Connecting);
            } else {
                assert_eq!(summary.scope, ConnectionScope::Mount);
                assert_eq!(summary.state, ConnectionState::Closing);
            }
        }
        rt.task.abort();
    }

    #[tokio::test]
    async fn capped_service_rejects_extra_machine() {
        let config = MonitorConfig {
            max_connections: Some(1),
            ..MonitorConfig::default()
        };
        let rt = start(config);
        assert!(rt.handle.add_machine().await.is_ok());
        let result = rt.handle.add_machine().await;
        assert!(matches!(
            result,
            Err(FleetError::ConnectionLimitReached { limit: 1 })
        ));
        rt.task.abort();
    }

    #[tokio::test]
    async fn shutdown_stops_loop() {
        let rt = start(MonitorConfig::default());
        let _ = rt.handle.add_machine().await;
        let Ok(closed) = rt.handle.shutdown().await else {
            panic!("shutdown failed");
        };
        assert_eq!(closed, 1);

        let joined = tokio::time::timeout(Duration::from_secs(2), rt.task).await;
        assert!(matches!(joined, Ok(Ok(()))));

        let result = rt.handle.add_machine().await;
        assert!(matches!(result, Err(FleetError::ServiceUnavailable)));
    }

    #[tokio::test]
    async fn close_connection_via_handle() {
        let rt = start(MonitorConfig::default());
        let Ok(added) = rt.handle.add_machine().await else {
            panic!("add machine failed");
        };
        tokio_test::assert_ok!(rt.handle.close_connection(added.connection_id).await);
        tokio_test::assert_err!(rt.handle.close_connection(added.connection_id).await);
        assert_eq!(rt.transport.drain(added.connection_id), vec![OutboundFrame::Close]);
        rt.task.abort();
    }
}
