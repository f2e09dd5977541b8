//! Error types for the loader crate.

use fleet_agent_core::ModuleId;
use thiserror::Error;

/// Errors that can occur while managing module instances.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The module was never added to the loader.
    #[error("module {0} not found in loader")]
    NotFound(ModuleId),

    /// The module instance is already running.
    #[error("module {0} is already running")]
    AlreadyRunning(ModuleId),

    /// The module instance is not running.
    #[error("module {0} is not running")]
    NotRunning(ModuleId),

    /// An embedded file path escapes the module directory.
    #[error("invalid file path {path:?} in module {module}")]
    InvalidPath {
        /// Module carrying the file.
        module: ModuleId,
        /// Offending relative path.
        path: String,
    },

    /// Filesystem error while materializing a module.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The control channel of a running instance is gone.
    #[error("control channel of module {0} is closed")]
    ControlClosed(ModuleId),

    /// The instance task ended abnormally.
    #[error("module {module} task failed: {reason}")]
    Task {
        /// Module whose task failed.
        module: ModuleId,
        /// Join error description.
        reason: String,
    },

    /// The loader reported a failure of its own.
    #[error("{0}")]
    Failed(String),
}

impl LoaderError {
    /// Check if this error is worth retrying later.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Failed(_))
    }
}

/// A specialized Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
