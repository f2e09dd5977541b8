//! Addressable endpoints registered with a transport.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::warn;

use crate::packet::{ControlMessage, Packet};
use crate::Result;

/// Capacity of an endpoint's inbound queue.
pub const ENDPOINT_QUEUE: usize = 64;

/// Outbound half of a transport, as seen by its endpoints.
#[async_trait]
pub trait PacketSink: Send + Sync {
    /// Send a packet to its destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the packet cannot be handed to the connection.
    async fn send_packet(&self, packet: Packet) -> Result<()>;
}

/// A named endpoint with its own inbound packet queue.
///
/// The transport delivers routed packets into the queue; the owner takes the
/// receiver once and drains it.
pub struct Endpoint {
    name: String,
    agent_id: String,
    inbox: mpsc::Sender<Packet>,
    receiver: Mutex<Option<mpsc::Receiver<Packet>>>,
    sink: Arc<dyn PacketSink>,
}

impl Endpoint {
    /// Create an endpoint that sends through `sink`.
    #[must_use]
    pub fn new(name: &str, agent_id: &str, sink: Arc<dyn PacketSink>) -> Self {
        let (inbox, receiver) = mpsc::channel(ENDPOINT_QUEUE);
        Self {
            name: name.to_string(),
            agent_id: agent_id.to_string(),
            inbox,
            receiver: Mutex::new(Some(receiver)),
            sink,
        }
    }

    /// Endpoint name, used to route inbound packets.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity used as the source of outbound packets.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Take the inbound receiver. Returns `None` after the first call.
    #[must_use]
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<Packet>> {
        self.receiver.lock().take()
    }

    /// Queue an inbound packet.
    ///
    /// Returns false if the receiver was dropped.
    pub async fn deliver(&self, packet: Packet) -> bool {
        self.inbox.send(packet).await.is_ok()
    }

    /// Send opaque bytes to `dst`.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the packet cannot be sent.
    pub async fn send_data_to(&self, dst: &str, data: Vec<u8>) -> Result<()> {
        let packet = Packet::data(&self.name, &self.agent_id, dst, data);
        self.sink.send_packet(packet).await
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("agent_id", &self.agent_id)
            .finish_non_exhaustive()
    }
}

/// Name-keyed endpoint routing shared by the transport implementations.
#[derive(Default)]
pub(crate) struct EndpointTable {
    endpoints: RwLock<HashMap<String, Arc<Endpoint>>>,
}

impl EndpointTable {
    pub(crate) fn register(
        &self,
        name: &str,
        agent_id: &str,
        sink: Arc<dyn PacketSink>,
    ) -> Option<Arc<Endpoint>> {
        let mut endpoints = self.endpoints.write();
        if endpoints.contains_key(name) {
            return None;
        }
        let endpoint = Arc::new(Endpoint::new(name, agent_id, sink));
        endpoints.insert(name.to_string(), Arc::clone(&endpoint));
        Some(endpoint)
    }

    pub(crate) fn deregister(&self, endpoint: &Endpoint) -> bool {
        let mut endpoints = self.endpoints.write();
        match endpoints.get(endpoint.name()) {
            Some(existing) if std::ptr::eq(Arc::as_ptr(existing), endpoint) => {
                endpoints.remove(endpoint.name());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.read().get(name).cloned()
    }

    /// Deliver a packet to the endpoint named by `packet.module`.
    pub(crate) async fn route(&self, packet: Packet) -> bool {
        let Some(endpoint) = self.get(&packet.module) else {
            warn!(module = %packet.module, kind = %packet.kind(), "No endpoint for packet");
            return false;
        };
        if endpoint.deliver(packet).await {
            true
        } else {
            warn!(module = %endpoint.name(), "Endpoint receiver is gone, packet dropped");
            false
        }
    }

    /// Deliver a control message to every registered endpoint.
    pub(crate) async fn broadcast(&self, message: &ControlMessage) {
        let endpoints: Vec<Arc<Endpoint>> = self.endpoints.read().values().cloned().collect();
        for endpoint in endpoints {
            endpoint
                .deliver(Packet::control(endpoint.name(), message.clone()))
                .await;
        }
    }
}
