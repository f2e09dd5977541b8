//! In-memory transport for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{Endpoint, EndpointTable, PacketSink};
use crate::packet::{AgentInfo, AgentKind, ControlMessage, Packet, Payload};
use crate::transport::{ConnectConfig, Transport};
use crate::{Result, TransportError};

/// Scripted result of one `connect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Fail immediately with this message.
    Fail(String),
    /// Connect and stay connected until closed or dropped.
    Hold,
}

/// A transport that records outbound packets and follows a connect script.
///
/// Once the script is exhausted every further `connect` holds.
#[derive(Default)]
pub struct MemoryTransport {
    endpoints: EndpointTable,
    sink: Arc<MemorySink>,
    script: Mutex<VecDeque<ConnectOutcome>>,
    attempts: Mutex<Vec<Instant>>,
    attempted: Notify,
    dropped: Notify,
    closed: CancellationToken,
}

#[derive(Default)]
struct MemorySink {
    sent: Mutex<Vec<Packet>>,
    changed: Notify,
}

#[async_trait]
impl PacketSink for MemorySink {
    async fn send_packet(&self, packet: Packet) -> Result<()> {
        self.sent.lock().push(packet);
        self.changed.notify_waiters();
        Ok(())
    }
}

impl MemoryTransport {
    /// Create a transport whose connects always hold.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that plays `script` before holding.
    #[must_use]
    pub fn with_script(script: impl IntoIterator<Item = ConnectOutcome>) -> Self {
        let transport = Self::default();
        transport.script.lock().extend(script);
        transport
    }

    /// Fail the next `n` connect attempts.
    #[must_use]
    pub fn failing(n: usize) -> Self {
        Self::with_script((0..n).map(|i| ConnectOutcome::Fail(format!("refused #{}", i + 1))))
    }

    /// Every packet sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Packet> {
        self.sink.sent.lock().clone()
    }

    /// Destination and bytes of every data packet sent so far.
    #[must_use]
    pub fn sent_data(&self) -> Vec<(String, Vec<u8>)> {
        self.sink
            .sent
            .lock()
            .iter()
            .filter_map(|packet| match &packet.payload {
                Payload::Data(data) => Some((packet.dst.clone(), data.data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `n` packets were sent.
    pub async fn wait_for_sent(&self, n: usize) {
        loop {
            let notified = self.sink.changed.notified();
            if self.sink.sent.lock().len() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Instants of every connect attempt so far.
    #[must_use]
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    /// Wait until at least `n` connect attempts were made.
    pub async fn wait_for_attempts(&self, n: usize) {
        loop {
            let notified = self.attempted.notified();
            if self.attempts.lock().len() >= n {
                return;
            }
            notified.await;
        }
    }

    /// End the current (or next) held connection with an error.
    pub fn drop_connection(&self) {
        self.dropped.notify_one();
    }

    /// Route a packet to its endpoint as if it came from the server.
    pub async fn inject(&self, packet: Packet) -> bool {
        self.endpoints.route(packet).await
    }

    /// Get a registered endpoint by name.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.get(name)
    }

    /// Returns true once `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, config: &ConnectConfig) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.attempts.lock().push(Instant::now());
        self.attempted.notify_waiters();

        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(ConnectOutcome::Hold);
        if let ConnectOutcome::Fail(message) = outcome {
            return Err(TransportError::Connection(message));
        }

        let peer = AgentInfo {
            id: "memory".to_string(),
            kind: AgentKind::Server,
            ip: config.connection.clone(),
            src: config.id.clone(),
            dst: String::new(),
        };
        self.endpoints
            .broadcast(&ControlMessage::AgentConnected(peer.clone()))
            .await;

        let result = tokio::select! {
            () = self.closed.cancelled() => Ok(()),
            () = self.dropped.notified() => {
                Err(TransportError::Connection("connection dropped".to_string()))
            }
        };

        self.endpoints
            .broadcast(&ControlMessage::AgentDisconnected(peer))
            .await;
        result
    }

    fn register_endpoint(&self, name: &str, agent_id: &str) -> Option<Arc<Endpoint>> {
        let sink: Arc<dyn PacketSink> = Arc::clone(&self.sink) as Arc<dyn PacketSink>;
        self.endpoints.register(name, agent_id, sink)
    }

    fn deregister_endpoint(&self, endpoint: &Endpoint) -> bool {
        self.endpoints.deregister(endpoint)
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        Ok(())
    }
}
