//! Addressed packets exchanged with the transport.
//!
//! Every packet names the endpoint it belongs to (`module`), a source and a
//! destination, and carries exactly one [`Payload`] variant. On the wire a
//! packet is one CBOR document.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, TransportError};

/// An addressed packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Name of the endpoint the packet is routed to or sent from.
    pub module: String,
    /// Source address.
    pub src: String,
    /// Destination address.
    pub dst: String,
    /// Kind-specific payload.
    pub payload: Payload,
}

impl Packet {
    /// Build a data packet.
    #[must_use]
    pub fn data(module: &str, src: &str, dst: &str, data: Vec<u8>) -> Self {
        Self {
            module: module.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            payload: Payload::Data(Data { data }),
        }
    }

    /// Build a control packet addressed to an endpoint.
    #[must_use]
    pub fn control(module: &str, message: ControlMessage) -> Self {
        Self {
            module: module.to_string(),
            src: String::new(),
            dst: String::new(),
            payload: Payload::Control(message),
        }
    }

    /// The kind of this packet.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        self.payload.kind()
    }

    /// Serialize the packet as CBOR.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Serialization` if encoding fails.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a packet from CBOR.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Serialization` if the bytes are not a packet.
    pub fn from_cbor(data: &[u8]) -> Result<Self> {
        ciborium::from_reader(data).map_err(|e| TransportError::Serialization(e.to_string()))
    }
}

/// Packet payloads, one variant per packet kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    /// Opaque bytes, used for command envelopes.
    Data(Data),
    /// A transferred file.
    File(FileData),
    /// A named text blob.
    Text(TextData),
    /// A log-style message.
    Msg(MsgData),
    /// Connection and endpoint lifecycle.
    Control(ControlMessage),
}

impl Payload {
    /// The packet kind of this payload.
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::Data(_) => PacketKind::Data,
            Self::File(_) => PacketKind::File,
            Self::Text(_) => PacketKind::Text,
            Self::Msg(_) => PacketKind::Msg,
            Self::Control(_) => PacketKind::Control,
        }
    }
}

/// Discriminant of [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Data packet.
    Data,
    /// File packet.
    File,
    /// Text packet.
    Text,
    /// Message packet.
    Msg,
    /// Control packet.
    Control,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "data",
            Self::File => "file",
            Self::Text => "text",
            Self::Msg => "msg",
            Self::Control => "control",
        };
        f.write_str(name)
    }
}

/// Data payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    /// Opaque bytes.
    pub data: Vec<u8>,
}

/// File payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    /// File name.
    pub name: String,
    /// Path on the sender.
    pub path: String,
    /// Unique transfer id.
    pub uniq: String,
    /// Contents.
    pub data: Vec<u8>,
}

/// Text payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextData {
    /// Text name.
    pub name: String,
    /// Contents.
    pub data: String,
}

/// Message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgData {
    /// Severity.
    pub mtype: MsgType,
    /// Contents.
    pub data: String,
}

/// Message severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgType {
    /// Debug.
    Debug,
    /// Info.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Control messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "info", rename_all = "snake_case")]
pub enum ControlMessage {
    /// A peer connected.
    AgentConnected(AgentInfo),
    /// A peer disconnected.
    AgentDisconnected(AgentInfo),
    /// The receiving endpoint must stop.
    StopModule,
}

/// Connection metadata carried by connect/disconnect control messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Peer identity.
    pub id: String,
    /// Peer kind.
    pub kind: AgentKind,
    /// Peer address.
    pub ip: String,
    /// Source address of the connection.
    pub src: String,
    /// Destination address of the connection.
    pub dst: String,
}

/// Kinds of peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// The central server.
    Server,
    /// Another agent.
    Agent,
    /// A browser session.
    Browser,
    /// An external integration.
    External,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Server => "server",
            Self::Agent => "agent",
            Self::Browser => "browser",
            Self::External => "external",
        };
        f.write_str(name)
    }
}
