//! Address-routed packet transport for the fleet agent.
//!
//! This crate provides the [`Transport`] trait the connection supervisor
//! drives and the [`WsTransport`] implementation that talks to the server
//! over a WebSocket. Consumers register named [`Endpoint`]s; each endpoint
//! owns an inbound packet queue and can send data to an address.
//!
//! Packets are closed sum types: a [`Packet`] carries exactly one
//! [`Payload`], and control payloads are [`ControlMessage`]s.
//!
//! # Testing
//!
//! Enable the `test-utils` feature to use [`MemoryTransport`], which follows
//! a scripted sequence of connect outcomes and records outbound packets.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod endpoint;
pub mod error;
pub mod packet;
pub mod transport;
pub mod ws;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use endpoint::{Endpoint, PacketSink};
pub use error::{Result, TransportError};
pub use packet::{
    AgentInfo, AgentKind, ControlMessage, Data, FileData, MsgData, MsgType, Packet, PacketKind,
    Payload, TextData,
};
pub use transport::{ConnectConfig, Transport};
pub use ws::WsTransport;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::{ConnectOutcome, MemoryTransport};
