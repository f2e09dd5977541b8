//! # fleet-agent-proto
//!
//! Protobuf wire format spoken between a fleet agent and its server.
//!
//! - [`wire`]: the raw prost messages
//! - [`codec`]: decoding inbound commands and encoding outbound responses
//!
//! ```
//! use fleet_agent_proto::{decode_command, Command};
//!
//! let bytes = Command::GetStatusModules.encode().unwrap();
//! assert_eq!(decode_command(&bytes).unwrap(), Command::GetStatusModules);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod error;
pub mod wire;

pub use codec::{decode_command, Batch, BatchEntry, Command, CommandKind, Envelope, Response};
pub use error::{CodecError, InvalidEntry, Result};
pub use wire::MessageType;
