//! WebSocket transport.
//!
//! Each binary frame carries one CBOR-encoded [`Packet`]. Inbound packets are
//! routed to the endpoint named by `packet.module`; outbound packets are
//! queued to the writer half of the socket while a connection is up.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::endpoint::{Endpoint, EndpointTable, PacketSink};
use crate::packet::{AgentInfo, AgentKind, ControlMessage, Packet};
use crate::transport::{ConnectConfig, Transport};
use crate::{Result, TransportError};

/// Capacity of the outbound frame queue.
const OUTBOUND_QUEUE: usize = 32;

/// Header carrying the agent identity on the upgrade request.
pub const AGENT_ID_HEADER: &str = "X-Agent-Id";

/// WebSocket implementation of [`Transport`].
pub struct WsTransport {
    endpoints: EndpointTable,
    sink: Arc<WsSink>,
    closed: CancellationToken,
}

#[derive(Default)]
struct WsSink {
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
}

#[async_trait]
impl PacketSink for WsSink {
    async fn send_packet(&self, packet: Packet) -> Result<()> {
        let tx = self
            .outbound
            .lock()
            .clone()
            .ok_or(TransportError::NotConnected)?;
        let frame = packet.to_cbor()?;
        tx.send(frame)
            .await
            .map_err(|_| TransportError::NotConnected)
    }
}

impl WsTransport {
    /// Create a disconnected transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoints: EndpointTable::default(),
            sink: Arc::new(WsSink::default()),
            closed: CancellationToken::new(),
        }
    }

    /// Returns true while a connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sink.outbound.lock().is_some()
    }

    async fn route_frame(&self, data: &[u8]) {
        match Packet::from_cbor(data) {
            Ok(packet) => {
                debug!(module = %packet.module, kind = %packet.kind(), src = %packet.src, "Packet received");
                self.endpoints.route(packet).await;
            }
            Err(e) => warn!(error = %e, len = data.len(), "Dropping undecodable frame"),
        }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, config: &ConnectConfig) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }

        let request = build_request(config)?;
        let session = Uuid::new_v4();
        debug!(%session, connection = %config.connection, "Connecting");

        let (stream, _) = tokio::select! {
            () = self.closed.cancelled() => return Ok(()),
            result = connect_async(request) => {
                result.map_err(|e| TransportError::Connection(e.to_string()))?
            }
        };
        let (mut write, mut read) = stream.split();

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_QUEUE);
        *self.sink.outbound.lock() = Some(tx);

        let peer = AgentInfo {
            id: String::new(),
            kind: AgentKind::Server,
            ip: extract_host(&config.connection)
                .unwrap_or_default()
                .to_string(),
            src: config.id.clone(),
            dst: String::new(),
        };
        info!(%session, server = %peer.ip, "Connected to server");
        self.endpoints
            .broadcast(&ControlMessage::AgentConnected(peer.clone()))
            .await;

        let result = loop {
            tokio::select! {
                () = self.closed.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break Ok(());
                }
                Some(frame) = rx.recv() => {
                    if let Err(e) = write.send(Message::Binary(frame)).await {
                        break Err(TransportError::Connection(e.to_string()));
                    }
                }
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Binary(data))) => self.route_frame(&data).await,
                    Some(Ok(Message::Close(_))) | None => {
                        break Err(TransportError::Connection("connection closed by server".to_string()));
                    }
                    // Pings are answered by tungstenite; text frames are not part of the protocol.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(TransportError::Connection(e.to_string())),
                },
            }
        };

        self.sink.outbound.lock().take();
        info!(%session, server = %peer.ip, "Disconnected from server");
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
        if !self.closed.is_cancelled() {
            debug!("Closing transport");
            self.closed.cancel();
        }
        Ok(())
    }
}

/// Build the upgrade request with identity and auth headers.
fn build_request(config: &ConnectConfig) -> Result<Request> {
    let mut request = config
        .connection
        .as_str()
        .into_client_request()
        .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

    let headers = request.headers_mut();
    headers.insert(
        AGENT_ID_HEADER,
        HeaderValue::from_str(&config.id).map_err(|e| TransportError::InvalidUrl(e.to_string()))?,
    );
    if !config.token.is_empty() {
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", config.token))
                .map_err(|e| TransportError::InvalidUrl(e.to_string()))?,
        );
    }

    Ok(request)
}

/// Extract host from URL.
fn extract_host(url: &str) -> Option<&str> {
    let url = url
        .strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))?;
    url.split('/').next()
}
