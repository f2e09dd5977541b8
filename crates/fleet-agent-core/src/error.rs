//! Common error types for the fleet agent.

use crate::ids::ModuleId;
use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors shared across the agent crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A module with the specified ID was not found.
    #[error("module {0} not found")]
    ModuleNotFound(ModuleId),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
