//! Connection supervision.
//!
//! The [`ConnectionSupervisor`] owns two tasks: the reconnect loop, run by
//! [`ConnectionSupervisor::run`], and the receive loop, which dispatches
//! inbound packets of the main endpoint to the orchestrator one at a time.
//!
//! # State Machine
//!
//! ```text
//!   Disconnected ──run──▶ Connecting ──AgentConnected──▶ Connected
//!        ▲                  │    ▲                          │
//!        └──connect failed──┘    └────AgentDisconnected─────┘
//!
//!   any ──stop──▶ Stopping ──▶ Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fleet_agent_loader::Loader;
use fleet_agent_transport::{ConnectConfig, ControlMessage, Endpoint, Packet, Payload, Transport};

use crate::error::{AgentError, Result};
use crate::orchestrator::Orchestrator;

/// Name of the endpoint the orchestrator is registered under.
pub const MAIN_ENDPOINT: &str = "main";

/// Fixed wait between connect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// Not connected, waiting to retry.
    Disconnected,
    /// A connect attempt is in progress.
    Connecting,
    /// Connected to the server.
    Connected,
    /// Stop was requested.
    Stopping,
    /// Stopped for good.
    Stopped,
}

impl SupervisorState {
    /// Returns true once stop was requested.
    #[must_use]
    pub const fn is_stopping(self) -> bool {
        matches!(self, Self::Stopping | Self::Stopped)
    }
}

struct Running {
    endpoint: Arc<Endpoint>,
    receiver: JoinHandle<()>,
}

/// Keeps the agent connected and feeds inbound commands to the orchestrator.
pub struct ConnectionSupervisor<T: Transport, L: Loader> {
    transport: Arc<T>,
    orchestrator: Arc<Orchestrator<L>>,
    connect: ConnectConfig,
    reconnect_interval: Duration,
    state: Arc<watch::Sender<SupervisorState>>,
    stop: CancellationToken,
    running: Mutex<Option<Running>>,
}

impl<T, L> ConnectionSupervisor<T, L>
where
    T: Transport + 'static,
    L: Loader + 'static,
{
    /// Create a supervisor with the default reconnect interval.
    #[must_use]
    pub fn new(transport: Arc<T>, orchestrator: Arc<Orchestrator<L>>, connect: ConnectConfig) -> Self {
        let (state, _) = watch::channel(SupervisorState::Disconnected);
        Self {
            transport,
            orchestrator,
            connect,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            state: Arc::new(state),
            stop: CancellationToken::new(),
            running: Mutex::new(None),
        }
    }

    /// Override the wait between connect attempts.
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// The supervised orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator<L>> {
        &self.orchestrator
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Register the main endpoint, start the receive loop and keep
    /// reconnecting until [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor is already running or stopped, or
    /// the main endpoint cannot be registered.
    pub async fn run(&self) -> Result<()> {
        self.start_receiving().await?;
        debug!(agent_id = %self.connect.id, "Main module started");

        loop {
            set_state(&self.state, SupervisorState::Connecting);
            let result = self.transport.connect(&self.connect).await;
            if self.stop.is_cancelled() {
                break;
            }

            set_state(&self.state, SupervisorState::Disconnected);
            match result {
                Ok(()) => warn!(connection = %self.connect.connection, "Connection closed, trying to reconnect"),
                Err(e) => warn!(connection = %self.connect.connection, error = %e, retriable = e.is_retriable(), "Trying to reconnect"),
            }

            tokio::select! {
                biased;
                () = self.stop.cancelled() => break,
                () = tokio::time::sleep(self.reconnect_interval) => {}
            }
        }

        debug!(agent_id = %self.connect.id, "Main module finished");
        Ok(())
    }

    /// Stop every module, tear down the endpoint and close the transport.
    ///
    /// Calling `stop` again after it succeeded is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if [`run`](Self::run) was never called, or
    /// the error of the first teardown step that failed.
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            return if self.state() == SupervisorState::Stopped {
                Ok(())
            } else {
                Err(AgentError::NotInitialized("transport"))
            };
        };

        debug!("Trying to stop main module");
        self.stop.cancel();
        self.state.send_replace(SupervisorState::Stopping);

        if let Err(e) = self.orchestrator.shutdown_modules().await {
            *running = Some(current);
            return Err(e);
        }

        if !self.transport.deregister_endpoint(&current.endpoint) {
            *running = Some(current);
            return Err(AgentError::Internal(
                "failed to deregister main endpoint".to_string(),
            ));
        }

        // Unblock the receive loop.
        let stop = Packet::control(MAIN_ENDPOINT, ControlMessage::StopModule);
        if !current.endpoint.deliver(stop).await {
            debug!("Receive loop already finished");
        }
        if let Err(e) = current.receiver.await {
            error!(error = %e, "Receive loop ended abnormally");
        }

        self.transport.close().await?;
        self.orchestrator.detach();
        self.state.send_replace(SupervisorState::Stopped);

        info!("Stopping of main module has done");
        Ok(())
    }

    async fn start_receiving(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(AgentError::Internal("supervisor is already running".to_string()));
        }
        if self.stop.is_cancelled() {
            return Err(AgentError::Internal("supervisor was stopped".to_string()));
        }

        let endpoint = self
            .transport
            .register_endpoint(MAIN_ENDPOINT, &self.connect.id)
            .ok_or_else(|| AgentError::Internal("failed to register main endpoint".to_string()))?;
        let Some(inbox) = endpoint.take_receiver() else {
            self.transport.deregister_endpoint(&endpoint);
            return Err(AgentError::Internal(
                "main endpoint receiver already taken".to_string(),
            ));
        };

        self.orchestrator.attach(Arc::clone(&endpoint));
        let receiver = tokio::spawn(receive_loop(
            Arc::clone(&self.orchestrator),
            inbox,
            Arc::clone(&self.state),
        ));

        *running = Some(Running { endpoint, receiver });
        Ok(())
    }
}

/// Move to `next` unless stop was already requested.
fn set_state(state: &watch::Sender<SupervisorState>, next: SupervisorState) {
    state.send_if_modified(|current| {
        if current.is_stopping() || *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

async fn receive_loop<L: Loader>(
    orchestrator: Arc<Orchestrator<L>>,
    mut inbox: mpsc::Receiver<Packet>,
    state: Arc<watch::Sender<SupervisorState>>,
) {
    while let Some(packet) = inbox.recv().await {
        let src = packet.src;
        match packet.payload {
            Payload::Data(data) => {
                debug!(src = %src, len = data.data.len(), "Received data");
                if let Err(e) = orchestrator.serve_data(&src, &data.data).await {
                    error!(src = %src, error = %e, "Failed to exec command");
                }
            }
            Payload::File(file) => {
                debug!(src = %src, name = %file.name, path = %file.path, uniq = %file.uniq, len = file.data.len(), "Received file");
            }
            Payload::Text(text) => {
                debug!(src = %src, name = %text.name, len = text.data.len(), "Received text");
            }
            Payload::Msg(msg) => {
                debug!(src = %src, mtype = %msg.mtype, len = msg.data.len(), "Received message");
            }
            Payload::Control(ControlMessage::AgentConnected(peer)) => {
                info!(id = %peer.id, kind = %peer.kind, ip = %peer.ip, "Agent connected");
                set_state(&state, SupervisorState::Connected);
            }
            Payload::Control(ControlMessage::AgentDisconnected(peer)) => {
                info!(id = %peer.id, kind = %peer.kind, ip = %peer.ip, "Agent disconnected");
                set_state(&state, SupervisorState::Connecting);
            }
            Payload::Control(ControlMessage::StopModule) => {
                info!("Got signal to stop main module");
                break;
            }
        }
    }
}
