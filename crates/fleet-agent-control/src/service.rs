//! Agent service shell.
//!
//! Builds the one orchestrator and connection supervisor from an
//! [`AgentConfig`] and owns the supervisor's run task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use fleet_agent_loader::{Loader, LocalLoader};
use fleet_agent_transport::{ConnectConfig, Transport, WsTransport};

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::info::{HostInfoProvider, InfoProvider};
use crate::orchestrator::Orchestrator;
use crate::supervisor::{ConnectionSupervisor, SupervisorState};

/// Time `start` waits for the run loop to fail early.
pub const STARTUP_GRACE: Duration = Duration::from_secs(1);

/// The running agent: one orchestrator behind one connection supervisor.
pub struct AgentService<T: Transport = WsTransport, L: Loader = LocalLoader> {
    config: AgentConfig,
    supervisor: Arc<ConnectionSupervisor<T, L>>,
    run: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl AgentService {
    /// Build the service with a WebSocket transport, a local loader and
    /// host identity.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Config` if the configuration is invalid.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let loader = match &config.work_dir {
            Some(dir) => LocalLoader::with_work_dir(dir),
            None => LocalLoader::new(),
        };
        let info = Arc::new(HostInfoProvider::new(config.agent_id.clone()));
        Self::with_parts(config, Arc::new(WsTransport::new()), Arc::new(loader), info)
    }
}

impl<T, L> AgentService<T, L>
where
    T: Transport + 'static,
    L: Loader + 'static,
{
    /// Build the service from explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Config` if the configuration is invalid.
    pub fn with_parts(
        config: AgentConfig,
        transport: Arc<T>,
        loader: Arc<L>,
        info: Arc<dyn InfoProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let orchestrator =
            Arc::new(Orchestrator::new(loader, info).with_loader_timeout(config.loader_timeout()));
        let connect = ConnectConfig {
            id: config.agent_id.clone(),
            token: config.token.clone(),
            connection: config.connection.clone(),
        };
        let supervisor = ConnectionSupervisor::new(transport, orchestrator, connect)
            .with_reconnect_interval(config.reconnect_interval());

        Ok(Self {
            config,
            supervisor: Arc::new(supervisor),
            run: Mutex::new(None),
        })
    }

    /// The configuration the service was built from.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The connection supervisor.
    #[must_use]
    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor<T, L>> {
        &self.supervisor
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    /// Spawn the supervisor run loop and give it a moment to fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the service is already started or the run loop
    /// failed during the grace period.
    pub async fn start(&self) -> Result<()> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(AgentError::Internal("agent is already started".to_string()));
        }

        info!(
            agent_id = %self.config.agent_id,
            connection = %self.config.connection,
            "Starting agent"
        );
        let supervisor = Arc::clone(&self.supervisor);
        let handle = tokio::spawn(async move { supervisor.run().await });

        tokio::time::sleep(STARTUP_GRACE).await;
        if handle.is_finished() {
            return join(handle).await;
        }

        *run = Some(handle);
        Ok(())
    }

    /// Stop the supervisor and wait for its run loop to finish.
    ///
    /// # Errors
    ///
    /// Returns the supervisor's stop error, or the run loop's error.
    pub async fn stop(&self) -> Result<()> {
        let mut run = self.run.lock().await;
        self.supervisor.stop().await?;

        if let Some(handle) = run.take() {
            join(handle).await?;
        }
        debug!(agent_id = %self.config.agent_id, "Agent stopped");
        Ok(())
    }
}

async fn join(handle: JoinHandle<Result<()>>) -> Result<()> {
    handle
        .await
        .map_err(|e| AgentError::Internal(format!("run loop panicked: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_agent_core::{AgentInformation, NetInfo, OsInfo};
    use fleet_agent_loader::MockLoader;
    use fleet_agent_transport::MemoryTransport;

    fn info() -> Arc<dyn InfoProvider> {
        Arc::new(AgentInformation {
            agent_id: "agent-1".to_string(),
            version: "0.1.0".to_string(),
            os: OsInfo::default(),
            net: NetInfo::default(),
            started_at: chrono::Utc::now(),
        })
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AgentConfig {
            connection: String::new(),
            ..AgentConfig::default()
        };
        let result = AgentService::with_parts(
            config,
            Arc::new(MemoryTransport::new()),
            Arc::new(MockLoader::new()),
            info(),
        );
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_stop() {
        let transport = Arc::new(MemoryTransport::new());
        let service = AgentService::with_parts(
            AgentConfig::default(),
            Arc::clone(&transport),
            Arc::new(MockLoader::new()),
            info(),
        )
        .unwrap();

        service.start().await.unwrap();
        assert_eq!(service.state(), SupervisorState::Connected);
        assert!(service.start().await.is_err());

        service.stop().await.unwrap();
        assert_eq!(service.state(), SupervisorState::Stopped);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let service = AgentService::with_parts(
            AgentConfig::default(),
            Arc::new(MemoryTransport::new()),
            Arc::new(MockLoader::new()),
            info(),
        )
        .unwrap();
        assert!(matches!(
            service.stop().await,
            Err(AgentError::NotInitialized(_))
        ));
    }
}
