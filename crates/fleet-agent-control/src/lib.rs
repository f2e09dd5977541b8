//! Module lifecycle orchestration for the fleet agent.
//!
//! This crate turns server commands into module lifecycle operations and
//! keeps the agent connected to its server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        AgentService                          │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                 ConnectionSupervisor                   │  │
//! │  │   reconnect loop (fixed 5s wait) │ receive loop        │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! │                              │                               │
//! │                              ▼                               │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                     Orchestrator                       │  │
//! │  │   ModuleRegistry │ batches │ status responses          │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                │                 │                 │
//!                ▼                 ▼                 ▼
//!         ┌───────────┐     ┌───────────┐     ┌───────────┐
//!         │ Transport │     │  Loader   │     │   Codec   │
//!         │   (ws)    │     │  (local)  │     │  (proto)  │
//!         └───────────┘     └───────────┘     └───────────┘
//! ```
//!
//! Every batch command (start, stop, update, update-config) is answered
//! with exactly one status-modules response, whether the batch succeeded
//! or not.
//!
//! # Usage
//!
//! ```no_run
//! use fleet_agent_control::{AgentConfig, AgentService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = AgentConfig::default();
//! config.apply_env();
//!
//! let service = AgentService::new(config)?;
//! service.start().await?;
//! tokio::signal::ctrl_c().await?;
//! service.stop().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod info;
pub mod orchestrator;
pub mod registry;
pub mod service;
pub mod supervisor;

pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use info::{HostInfoProvider, InfoProvider};
pub use orchestrator::Orchestrator;
pub use registry::ModuleRegistry;
pub use service::AgentService;
pub use supervisor::{ConnectionSupervisor, SupervisorState, DEFAULT_RECONNECT_INTERVAL, MAIN_ENDPOINT};

// Re-export commonly used types from dependencies for convenience
pub use fleet_agent_core::{AgentInformation, ModuleConfig, ModuleId, ModuleSpec, ModuleStatus};
pub use fleet_agent_proto::{Batch, Command, CommandKind};
