//! Module loader for the fleet agent.
//!
//! This crate provides the [`Loader`] trait the orchestrator drives and the
//! [`LocalLoader`] implementation that runs module instances in-process.
//! A loader keeps its own instance table keyed by [`ModuleId`]; the
//! orchestrator only ever refers to instances through that key or through the
//! [`ModuleInstance`] handles returned by [`Loader::get`].
//!
//! # Example
//!
//! ```
//! use fleet_agent_core::{ModuleConfig, ModuleId, ModuleItem, ModuleState, ModuleStatus};
//! use fleet_agent_loader::{Loader, LocalLoader};
//!
//! # async fn example() -> fleet_agent_loader::Result<()> {
//! let loader = LocalLoader::new();
//! let id = ModuleId::new("scanner").unwrap();
//! let state = ModuleState {
//!     config: ModuleConfig::new(id.clone()),
//!     item: ModuleItem::default(),
//! };
//!
//! loader.add(id.clone(), state);
//! loader.start(&id).await?;
//! assert_eq!(loader.get(&id).unwrap().status(), ModuleStatus::Running);
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature to use [`MockLoader`], which records every
//! call and supports injected failures.
//!
//! [`ModuleId`]: fleet_agent_core::ModuleId

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod loader;
pub mod local;

pub use error::{LoaderError, Result};
pub use loader::{Loader, ModuleInstance};
pub use local::{ControlSignal, LocalInstance, LocalLoader, UPDATE_CONFIG_SIGNAL};

#[cfg(any(test, feature = "test-utils"))]
pub use loader::mock::{LoaderCall, MockInstance, MockLoader};
