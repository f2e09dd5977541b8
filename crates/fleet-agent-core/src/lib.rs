//! Core types for the fleet agent.
//!
//! This crate provides the data model shared by every other agent crate:
//!
//! - **Identifiers**: [`ModuleId`], the unique key of a managed module
//! - **Module model**: declared configuration, config items, embedded files
//!   and arguments, and the per-module lifecycle status
//! - **Host information**: the identity reported to the server
//!
//! # Example
//!
//! ```
//! use fleet_agent_core::{ConfigItemUpdate, ModuleConfig, ModuleId};
//!
//! let id = ModuleId::new("scanner").unwrap();
//! let mut config = ModuleConfig::new(id.clone());
//!
//! // Only fields present in an update are applied.
//! let update = ConfigItemUpdate {
//!     current_config: Some("{\"interval\":30}".to_string()),
//!     ..Default::default()
//! };
//! config.config_item.apply(&update);
//!
//! assert_eq!(config.name, id);
//! assert_eq!(config.config_item.current_config, "{\"interval\":30}");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod info;
pub mod module;

pub use error::{CoreError, Result};
pub use ids::{IdError, ModuleId};
pub use info::{AgentInformation, NetInfo, OsInfo};
pub use module::{
    ConfigItem, ConfigItemUpdate, ModuleConfig, ModuleItem, ModuleSpec, ModuleState, ModuleStatus,
    ModuleStatusEntry,
};
