//! The transport contract consumed by the connection supervisor.

use std::sync::Arc;

use async_trait::async_trait;

use crate::endpoint::Endpoint;
use crate::Result;

/// Identity and address used to connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectConfig {
    /// Agent identity.
    pub id: String,
    /// Bearer token, empty when unauthenticated.
    pub token: String,
    /// Server connection string.
    pub connection: String,
}

/// The `Transport` trait defines connection establishment and endpoint
/// registration.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect and serve the connection until it ends.
    ///
    /// Returns `Ok` when the transport is closed while connected.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting fails or the connection drops.
    async fn connect(&self, config: &ConnectConfig) -> Result<()>;

    /// Register a named endpoint.
    ///
    /// Returns `None` if the name is taken.
    fn register_endpoint(&self, name: &str, agent_id: &str) -> Option<Arc<Endpoint>>;

    /// Remove an endpoint from routing. Its queue stays usable by its owner.
    ///
    /// Returns false if the endpoint was not registered.
    fn deregister_endpoint(&self, endpoint: &Endpoint) -> bool;

    /// Close the transport permanently.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be shut down cleanly.
    async fn close(&self) -> Result<()>;
}
