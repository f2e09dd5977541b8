//! Module lifecycle orchestration.
//!
//! The [`Orchestrator`] applies decoded commands to the [`ModuleRegistry`]
//! through the loader and answers with responses sent through the attached
//! endpoint.
//!
//! Batches are processed strictly in the order received:
//!
//! - start continues after a failing spec and returns the first error
//! - stop, update and update-config abort on the first error
//!
//! A batch entry whose name could not be decoded fails at its own
//! position, like any other per-module error.
//!
//! Every batch, successful or not, is followed by exactly one status
//! response. A send failure is combined with the batch error
//! (see [`AgentError::combine`]).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use fleet_agent_core::{ModuleId, ModuleSpec, ModuleStatus, ModuleStatusEntry};
use fleet_agent_loader::{Loader, UPDATE_CONFIG_SIGNAL};
use fleet_agent_proto::{Batch, BatchEntry, Command, Envelope, Response};
use fleet_agent_transport::Endpoint;

use crate::error::{AgentError, Result};
use crate::info::InfoProvider;
use crate::registry::ModuleRegistry;

/// Applies module lifecycle commands.
pub struct Orchestrator<L: Loader> {
    loader: Arc<L>,
    registry: ModuleRegistry,
    info: Arc<dyn InfoProvider>,
    endpoint: RwLock<Option<Arc<Endpoint>>>,
    response_lock: Mutex<()>,
    loader_timeout: Option<Duration>,
}

impl<L: Loader> Orchestrator<L> {
    /// Create an orchestrator without a loader deadline.
    #[must_use]
    pub fn new(loader: Arc<L>, info: Arc<dyn InfoProvider>) -> Self {
        Self {
            loader,
            registry: ModuleRegistry::new(),
            info,
            endpoint: RwLock::new(None),
            response_lock: Mutex::new(()),
            loader_timeout: None,
        }
    }

    /// Bound every loader start and stop by `timeout`.
    #[must_use]
    pub fn with_loader_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.loader_timeout = timeout;
        self
    }

    /// The registry of known modules.
    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// The loader driven by this orchestrator.
    #[must_use]
    pub fn loader(&self) -> &Arc<L> {
        &self.loader
    }

    /// Attach the endpoint responses are sent through.
    pub fn attach(&self, endpoint: Arc<Endpoint>) {
        *self.endpoint.write() = Some(endpoint);
    }

    /// Detach the endpoint, returning it.
    pub fn detach(&self) -> Option<Arc<Endpoint>> {
        self.endpoint.write().take()
    }

    /// Returns true while an endpoint is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.endpoint.read().is_some()
    }

    /// Decode a data packet from `src` and execute it, answering to `src`.
    ///
    /// A batch whose module list cannot be decoded still gets its status
    /// response.
    ///
    /// # Errors
    ///
    /// Returns the decode error or the error of the executed command.
    pub async fn serve_data(&self, src: &str, data: &[u8]) -> Result<()> {
        let envelope = Envelope::decode(data)?;
        let kind = envelope.kind();
        debug!(src = %src, command = %kind, "Command received");

        match envelope.into_command() {
            Ok(command) => self.execute(src, command).await,
            Err(e) if kind.is_batch() => self.finish_batch(src, Err(e.into())).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Execute a decoded command, answering to `dst`.
    ///
    /// # Errors
    ///
    /// Returns the batch error, the send error, or both combined.
    pub async fn execute(&self, dst: &str, command: Command) -> Result<()> {
        let kind = command.kind();
        let result = match command {
            Command::GetInformation => self.send_information(dst).await,
            Command::GetStatusModules => self.send_status_modules(dst).await,
            Command::StartModules(specs) => {
                let batch = self.start_modules(&specs).await;
                self.finish_batch(dst, batch).await
            }
            Command::StopModules(ids) => {
                let batch = self.stop_modules(&ids).await;
                self.finish_batch(dst, batch).await
            }
            Command::UpdateModules(specs) => {
                let batch = self.update_modules(&specs).await;
                self.finish_batch(dst, batch).await
            }
            Command::UpdateConfigModules(specs) => {
                let batch = self.update_config_modules(&specs).await;
                self.finish_batch(dst, batch).await
            }
        };

        match &result {
            Ok(()) => debug!(dst = %dst, command = %kind, "Command done"),
            Err(e) => {
                error!(dst = %dst, command = %kind, error = %e, retriable = e.is_retriable(), "Command failed");
            }
        }
        result
    }

    /// Send the host and agent identity to `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be encoded or sent.
    pub async fn send_information(&self, dst: &str) -> Result<()> {
        let info = self.info.information();
        self.send_response(dst, &Response::Information(info)).await
    }

    /// Send the status of every module to `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be encoded or sent.
    pub async fn send_status_modules(&self, dst: &str) -> Result<()> {
        let entries = self.status_modules();
        self.send_response(dst, &Response::StatusModules(entries))
            .await
    }

    /// Status of every module known to both the loader and the registry.
    ///
    /// Modules known to only one side are skipped.
    #[must_use]
    pub fn status_modules(&self) -> Vec<ModuleStatusEntry> {
        self.loader
            .list()
            .into_iter()
            .filter_map(|id| {
                let config = self.registry.get(&id)?;
                let instance = self.loader.get(&id)?;
                Some(ModuleStatusEntry {
                    status: instance.status(),
                    name: id,
                    config,
                })
            })
            .collect()
    }

    /// Start every spec in order.
    ///
    /// # Errors
    ///
    /// Every spec is attempted; the first error is returned.
    pub async fn start_modules(&self, specs: &Batch<ModuleSpec>) -> Result<()> {
        let mut first_error = None;
        for entry in specs {
            let result = match entry {
                Ok(spec) => self.start_one(spec).await,
                Err(invalid) => Err(AgentError::from(invalid.clone())),
            };
            if let Err(e) = result {
                warn!(error = %e, retriable = e.is_retriable(), "Failed to start module");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Stop every named module in order.
    ///
    /// # Errors
    ///
    /// Aborts on the first error; modules before it stay stopped.
    pub async fn stop_modules(&self, ids: &Batch<ModuleId>) -> Result<()> {
        for entry in ids {
            self.stop_one(valid(entry)?).await?;
        }
        Ok(())
    }

    /// Replace every module with its new spec, in order.
    ///
    /// # Errors
    ///
    /// Aborts on the first error.
    pub async fn update_modules(&self, specs: &Batch<ModuleSpec>) -> Result<()> {
        for entry in specs {
            let spec = valid(entry)?;
            self.stop_one(spec.id()).await?;
            self.start_one(spec).await?;
            info!(module = %spec.id(), version = %spec.config.version, "Module updated");
        }
        Ok(())
    }

    /// Merge config items into running modules and signal them, in order.
    ///
    /// # Errors
    ///
    /// Aborts on the first error.
    pub async fn update_config_modules(&self, specs: &Batch<ModuleSpec>) -> Result<()> {
        for entry in specs {
            self.update_config_one(valid(entry)?)?;
        }
        Ok(())
    }

    /// Stop and forget every module known to the loader, then clear the
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the loader cannot stop or forget a module.
    pub async fn shutdown_modules(&self) -> Result<()> {
        self.loader.stop_all().await.map_err(AgentError::Shutdown)?;

        for id in self.loader.list() {
            if !self.loader.del(&id) {
                return Err(AgentError::Internal(format!(
                    "failed to delete module {id} from loader"
                )));
            }
        }
        self.registry.clear();

        info!("All modules stopped");
        Ok(())
    }

    async fn start_one(&self, spec: &ModuleSpec) -> Result<()> {
        let id = spec.id();
        if self.registry.contains(id) || self.loader.get(id).is_some() {
            return Err(AgentError::ModuleAlreadyExists(id.clone()));
        }
        if !self.loader.add(id.clone(), spec.to_state()) {
            return Err(AgentError::ModuleAlreadyExists(id.clone()));
        }

        if let Err(e) = self.bounded(id, self.loader.start(id)).await {
            self.loader.del(id);
            return Err(e);
        }
        self.registry.insert(spec.config.clone());

        info!(module = %id, version = %spec.config.version, "Module started");
        Ok(())
    }

    async fn stop_one(&self, id: &ModuleId) -> Result<()> {
        if !self.registry.contains(id) || self.loader.get(id).is_none() {
            return Err(AgentError::ModuleNotFound(id.clone()));
        }

        self.bounded(id, self.loader.stop(id)).await?;
        if !self.loader.del(id) {
            return Err(AgentError::Internal(format!(
                "failed to delete module {id} from loader"
            )));
        }
        self.registry.remove(id);

        info!(module = %id, "Module stopped");
        Ok(())
    }

    fn update_config_one(&self, spec: &ModuleSpec) -> Result<()> {
        let id = spec.id();
        let instance = self
            .loader
            .get(id)
            .ok_or_else(|| AgentError::ModuleNotFound(id.clone()))?;
        if instance.status() != ModuleStatus::Running {
            return Err(AgentError::ModuleNotRunning(id.clone()));
        }

        let config = self.registry.update_config_item(id, &spec.config_item)?;
        instance
            .send_control(
                UPDATE_CONFIG_SIGNAL,
                config.config_item.current_config.as_bytes(),
            )
            .map_err(|source| AgentError::Loader {
                module: id.clone(),
                source,
            })?;

        info!(module = %id, "Module config updated");
        Ok(())
    }

    async fn bounded<F>(&self, id: &ModuleId, call: F) -> Result<()>
    where
        F: Future<Output = fleet_agent_loader::Result<()>> + Send,
    {
        let result = match self.loader_timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| AgentError::LoaderTimeout {
                    module: id.clone(),
                    timeout,
                })?,
            None => call.await,
        };
        result.map_err(|source| AgentError::Loader {
            module: id.clone(),
            source,
        })
    }

    async fn finish_batch(&self, dst: &str, batch: Result<()>) -> Result<()> {
        let sent = self.send_status_modules(dst).await;
        if let Err(e) = &sent {
            error!(dst = %dst, error = %e, "Failed to send modules status");
        }
        AgentError::combine(batch, sent)
    }

    async fn send_response(&self, dst: &str, response: &Response) -> Result<()> {
        let _guard = self.response_lock.lock().await;

        let data = response.encode()?;
        let endpoint = self
            .endpoint
            .read()
            .clone()
            .ok_or(AgentError::NotInitialized("module endpoint"))?;
        endpoint.send_data_to(dst, data).await?;
        Ok(())
    }
}

/// The module of a batch entry, or the entry's own error.
fn valid<T>(entry: &BatchEntry<T>) -> Result<&T> {
    entry
        .as_ref()
        .map_err(|invalid| AgentError::from(invalid.clone()))
}
