//! Error types for the agent control layer.
//!
//! Errors fall into four groups: protocol decode errors ([`AgentError::Codec`],
//! `InvalidModule`), lifecycle precondition errors (`ModuleAlreadyExists`, `ModuleNotFound`,
//! `ModuleNotRunning`), collaborator errors (`Loader`, `Shutdown`,
//! `LoaderTimeout`, `Transport`) and initialization errors
//! (`NotInitialized`).

use std::time::Duration;

use fleet_agent_core::{CoreError, ModuleId};
use fleet_agent_loader::LoaderError;
use fleet_agent_proto::{CodecError, InvalidEntry};
use fleet_agent_transport::TransportError;
use thiserror::Error;

/// A result type using `AgentError`.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur while serving commands or supervising the
/// connection.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A command could not be decoded, or a response could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A batch entry named no usable module.
    #[error(transparent)]
    InvalidModule(#[from] InvalidEntry),

    /// A start targeted a module that is already known.
    #[error("module {0} already exists")]
    ModuleAlreadyExists(ModuleId),

    /// A command targeted a module that is not known.
    #[error("module {0} not found")]
    ModuleNotFound(ModuleId),

    /// A config update targeted a module that is not running.
    #[error("module {0} is not running")]
    ModuleNotRunning(ModuleId),

    /// The loader failed for one module.
    #[error("module {module}: {source}")]
    Loader {
        /// Module the loader call was about.
        module: ModuleId,
        /// Loader failure.
        #[source]
        source: LoaderError,
    },

    /// The loader failed to stop every module.
    #[error("modules didn't stop: {0}")]
    Shutdown(#[source] LoaderError),

    /// A loader call did not finish in time.
    #[error("loader call for module {module} timed out after {timeout:?}")]
    LoaderTimeout {
        /// Module the loader call was about.
        module: ModuleId,
        /// Deadline that expired.
        timeout: Duration,
    },

    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A component was used before it was set up.
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    /// A batch failed and sending its status response failed too.
    #[error("{batch} | {send}")]
    Batch {
        /// Error of the batch itself.
        batch: Box<AgentError>,
        /// Error of the status send.
        send: Box<AgentError>,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other core error.
    #[error(transparent)]
    Core(CoreError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Combine a batch outcome with the outcome of its status send.
    ///
    /// When both failed the result renders as `"<batch> | <send>"`;
    /// otherwise the single failure is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns whichever of the two outcomes failed.
    pub fn combine(batch: Result<()>, send: Result<()>) -> Result<()> {
        match (batch, send) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(batch), Err(send)) => Err(Self::Batch {
                batch: Box::new(batch),
                send: Box::new(send),
            }),
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Loader { source, .. } | Self::Shutdown(source) => source.is_retriable(),
            Self::Transport(e) => e.is_retriable(),
            Self::LoaderTimeout { .. } => true,
            Self::Batch { batch, send } => batch.is_retriable() || send.is_retriable(),
            _ => false,
        }
    }
}

impl From<CoreError> for AgentError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::ModuleNotFound(id) => Self::ModuleNotFound(id),
            other => Self::Core(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ModuleId {
        ModuleId::new(name).unwrap()
    }

    #[test]
    fn combine_keeps_single_failure() {
        assert!(AgentError::combine(Ok(()), Ok(())).is_ok());

        let err = AgentError::combine(Err(AgentError::ModuleNotFound(id("a"))), Ok(())).unwrap_err();
        assert_eq!(err.to_string(), "module a not found");

        let err = AgentError::combine(Ok(()), Err(AgentError::NotInitialized("endpoint")))
            .unwrap_err();
        assert_eq!(err.to_string(), "endpoint is not initialized");
    }

    #[test]
    fn combine_joins_both_failures() {
        let err = AgentError::combine(
            Err(AgentError::ModuleAlreadyExists(id("a"))),
            Err(AgentError::Transport(TransportError::NotConnected)),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "module a already exists | transport error: transport is not connected"
        );
        assert!(err.is_retriable());
    }

    #[test]
    fn core_not_found_maps_to_lifecycle_error() {
        let err = AgentError::from(CoreError::ModuleNotFound(id("x")));
        assert!(matches!(err, AgentError::ModuleNotFound(_)));
        assert!(!err.is_retriable());
    }

    #[test]
    fn timeouts_are_retriable() {
        let err = AgentError::LoaderTimeout {
            module: id("slow"),
            timeout: Duration::from_secs(60),
        };
        assert!(err.is_retriable());
        assert!(err.to_string().contains("slow"));
    }

    #[test]
    fn invalid_module_is_final() {
        let err = AgentError::from(InvalidEntry {
            name: "bad/name".to_string(),
            reason: "contains '/'".to_string(),
        });
        assert!(!err.is_retriable());
        assert_eq!(err.to_string(), "invalid module \"bad/name\": contains '/'");

        let err = AgentError::Loader {
            module: id("a"),
            source: LoaderError::Failed("busy".to_string()),
        };
        assert!(err.is_retriable());
    }
}
