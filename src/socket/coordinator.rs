//! Coordinator socket: the single signaling WebSocket to the backend.
//!
//! Owns the authenticated connect handshake, liveness heartbeats, batched
//! event dispatch and the connected/disconnected lifecycle. All expected
//! failures resolve to values; nothing here throws at the caller once the
//! handshake window is over.

use log::{debug, error, trace, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::batch::BatchProcessor;
use crate::config::CoordinatorConfig;
use crate::events::{
    ConnectUserData, ConnectedEvent, ConnectedUser, VideoEvent, WsAuthMessageRequest,
};
use crate::health::HealthMonitor;
use crate::parser::CoordinatorParser;
use crate::socket::error::{ApiError, SocketError};
use crate::subscription::{Subscription, SubscriptionManager};
use crate::transport::{Transport, TransportEvent, TransportFactory};

/// HTTP code confirming the WebSocket upgrade.
const UPGRADE_OK: u16 = 101;

/// Successfully authenticated connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedState {
    pub user: ConnectedUser,
    pub connection_id: String,
}

/// Not connected, with whatever is known about why.
#[derive(Debug, Clone, Default)]
pub struct DisconnectedState {
    /// Transport or protocol failure, if any.
    pub error: Option<Arc<SocketError>>,
    /// Structured server rejection, if any.
    pub api_error: Option<ApiError>,
}

impl DisconnectedState {
    fn from_error(error: SocketError) -> Self {
        Self {
            error: Some(Arc::new(error)),
            api_error: None,
        }
    }

    fn from_api_error(api_error: ApiError) -> Self {
        Self {
            error: None,
            api_error: Some(api_error),
        }
    }

    fn has_cause(&self) -> bool {
        self.error.is_some() || self.api_error.is_some()
    }
}

/// Coordinator socket state. Starts disconnected; only the socket's own
/// handshake and cleanup logic ever writes it.
#[derive(Debug, Clone)]
pub enum ConnectionState {
    Connected(ConnectedState),
    Disconnected(DisconnectedState),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Listener for coordinator events and connection lifecycle.
pub trait CoordinatorSocketListener: Send + Sync {
    /// Called for every decoded domain event.
    fn on_event(&self, _event: &VideoEvent) {}

    /// Called when the connection state changes.
    fn on_state(&self, _state: &ConnectionState) {}
}

type ConnectResult = Result<ConnectedState, DisconnectedState>;
type ConnectResolver = Option<oneshot::Sender<ConnectResult>>;

pub struct CoordinatorSocket {
    config: CoordinatorConfig,
    factory: Arc<dyn TransportFactory>,
    parser: CoordinatorParser,
    health: Arc<HealthMonitor>,
    batch: Arc<BatchProcessor<String>>,
    listeners: Arc<SubscriptionManager<dyn CoordinatorSocketListener>>,
    state: std::sync::Mutex<ConnectionState>,
    /// Template for heartbeats: the last `connection.ok` payload.
    connected_event: std::sync::Mutex<Option<ConnectedEvent>>,
    transport: std::sync::Mutex<Option<Arc<dyn Transport>>>,
    /// The raw-message subscription: the task draining transport events.
    run_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CoordinatorSocket {
    pub fn new(config: CoordinatorConfig, factory: Arc<dyn TransportFactory>) -> Arc<Self> {
        let health = Arc::new(HealthMonitor::new(
            config.health_interval,
            config.liveness_threshold,
        ));
        let batch = Arc::new(BatchProcessor::new(config.batch_interval));
        Arc::new(Self {
            config,
            factory,
            parser: CoordinatorParser::new(),
            health,
            batch,
            listeners: Arc::new(SubscriptionManager::new()),
            state: std::sync::Mutex::new(ConnectionState::Disconnected(
                DisconnectedState::default(),
            )),
            connected_event: std::sync::Mutex::new(None),
            transport: std::sync::Mutex::new(None),
            run_task: std::sync::Mutex::new(None),
        })
    }

    /// Current connection state snapshot.
    pub fn state(&self) -> ConnectionState {
        self.state.lock().unwrap().clone()
    }

    /// Registers a listener for events and state changes.
    pub fn subscribe(&self, listener: Arc<dyn CoordinatorSocketListener>) -> Subscription {
        self.listeners.subscribe(listener)
    }

    /// Connects and authenticates against the coordinator.
    ///
    /// Resolves exactly once: either the `Connected` state after the server
    /// confirms the auth handshake, or a `Disconnected` value describing the
    /// failure. Expected failure modes never propagate as panics or opaque
    /// errors. Dropping the returned future abandons the pending handshake
    /// without leaking a phantom completion.
    pub async fn connect(self: &Arc<Self>, data: ConnectUserData) -> ConnectResult {
        debug!("[connect] Connecting to coordinator socket: {}", data.id);
        self.init();

        // The event receiver is created together with the transport, so it
        // buffers from before the first byte: the connected-confirmation
        // race of a late listener cannot happen.
        let (transport, events) = match self.factory.open(&self.config.socket).await {
            Ok(opened) => opened,
            Err(e) => {
                error!("[connect] Failed to open coordinator socket. {e}");
                let disconnected = DisconnectedState::from_error(SocketError::Open(e.to_string()));
                *self.state.lock().unwrap() = ConnectionState::Disconnected(disconnected.clone());
                return Err(disconnected);
            }
        };
        *self.transport.lock().unwrap() = Some(transport);

        let (result_tx, result_rx) = oneshot::channel();
        let handle = tokio::task::spawn(self.clone().run_loop(events, data, Some(result_tx)));
        *self.run_task.lock().unwrap() = Some(handle);

        match result_rx.await {
            Ok(result) => result,
            // The run loop ended without resolving the handshake.
            Err(_) => Err(DisconnectedState::from_error(SocketError::ConnectCancelled)),
        }
    }

    /// Closes the transport and forces cleanup. Returns the outcome of the
    /// close itself; the state transition to `Disconnected` always happens.
    pub async fn disconnect(&self) -> Result<(), SocketError> {
        let transport = self.transport.lock().unwrap().clone();
        let result = match transport {
            Some(transport) => transport
                .close()
                .await
                .map_err(|e| SocketError::Transport(e.to_string())),
            None => Ok(()),
        };
        self.cleanup(None, None);
        debug!("[disconnect] Disconnected coordinator socket.");
        result
    }

    /// Wires the health monitor and batch processor. Callbacks hold weak
    /// references; the socket owns the monitor, not the other way around.
    fn init(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.health.on_interval(move || {
            let weak = weak.clone();
            async move {
                let Some(socket) = weak.upgrade() else { return };
                let template = socket.connected_event.lock().unwrap().clone();
                let Some(template) = template else {
                    error!("[onInterval] Health check not run. Connected event is missing");
                    return;
                };
                trace!("[onInterval] Coordinator socket health check");
                match socket.parser.encode(&VideoEvent::Connected(template)) {
                    Ok(frame) => {
                        if let Err(e) = socket.send_frame(&frame).await {
                            // Connection stays up; liveness decides its fate.
                            error!("[onInterval] Health check send failed. {e}");
                        }
                    }
                    Err(e) => error!("[onInterval] Health check encode failed. {e}"),
                }
            }
        });

        let weak = Arc::downgrade(self);
        self.health.on_liveness_threshold(move || {
            let weak = weak.clone();
            async move {
                let Some(socket) = weak.upgrade() else { return };
                error!("[onLivenessThreshold] Coordinator socket liveness threshold reached");
                socket.cleanup(Some(SocketError::LivenessThreshold), None);
            }
        });

        let weak = Arc::downgrade(self);
        self.batch.on_batch(move |batch: Vec<String>| {
            let weak = weak.clone();
            async move {
                let Some(socket) = weak.upgrade() else { return };
                trace!("[onBatch] Coordinator socket batch of {}", batch.len());
                socket.health.ack();
                for message in batch {
                    match socket.parser.decode(&message) {
                        Ok(event) => {
                            socket.listeners.for_each(|listener| listener.on_event(&event));
                        }
                        // A bad frame never takes the others down with it.
                        Err(e) => error!("[onBatch] Coordinator socket batch decode failed. {e}"),
                    }
                }
            }
        });
        self.batch.start();
    }

    async fn send_frame(&self, frame: &str) -> Result<(), SocketError> {
        let transport = self.transport.lock().unwrap().clone();
        let transport = transport.ok_or_else(|| SocketError::Transport("socket is closed".into()))?;
        transport
            .send(frame)
            .await
            .map_err(|e| SocketError::Transport(e.to_string()))
    }

    /// Drains transport events. While a resolver is pending the loop is in
    /// the handshake phase and the first decoded message decides the connect
    /// outcome; afterwards frames flow into the batch processor.
    async fn run_loop(
        self: Arc<Self>,
        mut events: mpsc::Receiver<TransportEvent>,
        data: ConnectUserData,
        mut resolver: ConnectResolver,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Opened { code } => {
                    if resolver.is_none() {
                        continue;
                    }
                    if code == UPGRADE_OK {
                        debug!("[onOpen] Coordinator socket opened");
                        if let Err(disconnected) = self.send_auth(&data).await {
                            self.resolve_failure(&mut resolver, disconnected);
                            return;
                        }
                    } else {
                        error!("[onOpen] Coordinator socket failed to open. Code: {code}");
                        self.resolve_failure(
                            &mut resolver,
                            DisconnectedState::from_error(SocketError::UnexpectedOpenCode(code)),
                        );
                        return;
                    }
                }
                TransportEvent::Message(text) => {
                    trace!("[onMessage] Coordinator socket message: {} bytes", text.len());
                    if resolver.is_some() {
                        self.handle_handshake_message(&text, &mut resolver);
                        if resolver.is_none() && !self.state.lock().unwrap().is_connected() {
                            // Resolved as a failure; the loop is done.
                            return;
                        }
                    }
                    // Every decodable frame is also a domain event, the
                    // confirmation and early arrivals included.
                    self.batch.on_message(text);
                }
                TransportEvent::Closed { code, reason } => {
                    let error = if code == self.config.socket.clean_close_code {
                        None
                    } else {
                        Some(SocketError::Closed {
                            code,
                            reason: reason.clone(),
                        })
                    };
                    error!("[onClosed] Coordinator socket closed. Code: {code}, Reason: {reason}");
                    if let Some(tx) = resolver.take() {
                        let disconnected = match &error {
                            Some(_) => DisconnectedState::from_error(SocketError::Closed {
                                code,
                                reason,
                            }),
                            None => DisconnectedState::default(),
                        };
                        let _ = tx.send(Err(disconnected));
                    }
                    self.cleanup(error, None);
                    return;
                }
                TransportEvent::Failed(message) => {
                    error!("[onFailure] Coordinator socket failure. {message}");
                    if let Some(tx) = resolver.take() {
                        let _ = tx.send(Err(DisconnectedState::from_error(SocketError::Transport(
                            message.clone(),
                        ))));
                    }
                    self.cleanup(Some(SocketError::Transport(message)), None);
                    return;
                }
            }
        }
        // Transport dropped its sender without a close event.
        if resolver.is_some() {
            self.resolve_failure(
                &mut resolver,
                DisconnectedState::from_error(SocketError::Transport("event stream ended".into())),
            );
        }
    }

    async fn send_auth(&self, data: &ConnectUserData) -> Result<(), DisconnectedState> {
        let request = WsAuthMessageRequest::from_connect_data(data);
        let frame = self.parser.encode(&request).map_err(|e| {
            error!("[onOpen] Failed to serialize auth request. {e}");
            DisconnectedState::from_error(SocketError::Serialization(e))
        })?;
        trace!("[onOpen] Sending auth request");
        self.send_frame(&frame).await.map_err(|e| {
            error!("[onOpen] Failed to send auth request. {e}");
            DisconnectedState::from_error(e)
        })
    }

    /// First-message handling during the handshake. Only the first signal
    /// wins; once the resolver is consumed later signals are no-ops for the
    /// pending `connect()`.
    fn handle_handshake_message(&self, text: &str, resolver: &mut ConnectResolver) {
        match self.parser.decode(text) {
            Ok(VideoEvent::Connected(event)) => {
                trace!("[onMessage] Handling connected event");
                let connected = ConnectedState {
                    user: ConnectedUser::from(&event.me),
                    connection_id: event.connection_id.clone(),
                };
                *self.connected_event.lock().unwrap() = Some(event);
                let state = ConnectionState::Connected(connected.clone());
                *self.state.lock().unwrap() = state.clone();
                self.listeners.for_each(|listener| listener.on_state(&state));
                if let Some(tx) = resolver.take() {
                    let _ = tx.send(Ok(connected));
                }
                self.health.start();
            }
            Ok(VideoEvent::ConnectionError(event)) => {
                error!("[onMessage] Coordinator socket connection error: {}", event.error);
                self.resolve_failure(resolver, DisconnectedState::from_api_error(event.error));
            }
            Ok(other) => {
                // Not a handshake signal; leave the connect pending.
                warn!(
                    "[onMessage] Unexpected event during handshake: {:?}",
                    other.call_cid()
                );
            }
            Err(e) => {
                error!("[onMessage] Failed to deserialize coordinator socket message. {e}");
                self.resolve_failure(
                    resolver,
                    DisconnectedState::from_error(SocketError::Serialization(e)),
                );
            }
        }
    }

    fn resolve_failure(&self, resolver: &mut ConnectResolver, disconnected: DisconnectedState) {
        *self.state.lock().unwrap() = ConnectionState::Disconnected(disconnected.clone());
        if let Some(tx) = resolver.take() {
            let _ = tx.send(Err(disconnected));
        }
    }

    /// Tears the connection state down. Idempotent: a repeat call without a
    /// cause keeps the more specific error recorded by the first one, and
    /// listeners simply see `Disconnected` again.
    fn cleanup(&self, error: Option<SocketError>, api_error: Option<ApiError>) {
        trace!("[cleanup] Coordinator socket cleanup (err: {error:?})");
        let state = {
            let mut guard = self.state.lock().unwrap();
            let disconnected = match &*guard {
                ConnectionState::Disconnected(previous)
                    if previous.has_cause() && error.is_none() && api_error.is_none() =>
                {
                    previous.clone()
                }
                _ => DisconnectedState {
                    error: error.map(Arc::new),
                    api_error,
                },
            };
            *guard = ConnectionState::Disconnected(disconnected);
            guard.clone()
        };
        self.health.stop();
        self.batch.stop();
        self.listeners.for_each(|listener| listener.on_state(&state));
        *self.connected_event.lock().unwrap() = None;
        *self.transport.lock().unwrap() = None;
        if let Some(handle) = self.run_task.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for CoordinatorSocket {
    fn drop(&mut self) {
        if let Some(handle) = self.run_task.lock().unwrap().take() {
            handle.abort();
        }
    }
}
