//! In-process module loader.
//!
//! `LocalLoader` materializes a module's embedded files under
//! `<work_dir>/<module>/` and runs one task per started instance that
//! drains the instance's control channel.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fleet_agent_core::{ModuleId, ModuleState, ModuleStatus};

use crate::loader::{Loader, ModuleInstance};
use crate::{LoaderError, Result};

/// Control signal that replaces the current module configuration.
pub const UPDATE_CONFIG_SIGNAL: &str = "update_config";

/// A control signal queued for a running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSignal {
    /// Signal name.
    pub signal: String,
    /// Signal payload.
    pub payload: Vec<u8>,
}

/// Loader that runs module instances inside the agent process.
#[derive(Default)]
pub struct LocalLoader {
    work_dir: Option<PathBuf>,
    modules: RwLock<BTreeMap<ModuleId, Arc<LocalInstance>>>,
}

impl LocalLoader {
    /// Create a loader that keeps modules in memory only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader that writes module files under `work_dir`.
    #[must_use]
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: Some(work_dir.into()),
            modules: RwLock::new(BTreeMap::new()),
        }
    }

    /// Directory a module is materialized into, if a work dir is set.
    #[must_use]
    pub fn module_dir(&self, id: &ModuleId) -> Option<PathBuf> {
        self.work_dir.as_ref().map(|dir| dir.join(id.as_str()))
    }

    /// Get the concrete instance of a module.
    #[must_use]
    pub fn instance(&self, id: &ModuleId) -> Option<Arc<LocalInstance>> {
        self.modules.read().get(id).cloned()
    }

    fn require(&self, id: &ModuleId) -> Result<Arc<LocalInstance>> {
        self.instance(id)
            .ok_or_else(|| LoaderError::NotFound(id.clone()))
    }
}

#[async_trait]
impl Loader for LocalLoader {
    fn list(&self) -> Vec<ModuleId> {
        self.modules.read().keys().cloned().collect()
    }

    fn get(&self, id: &ModuleId) -> Option<Arc<dyn ModuleInstance>> {
        self.instance(id)
            .map(|instance| instance as Arc<dyn ModuleInstance>)
    }

    fn add(&self, id: ModuleId, state: ModuleState) -> bool {
        let mut modules = self.modules.write();
        if modules.contains_key(&id) {
            return false;
        }
        debug!(module = %id, version = %state.config.version, "Module added");
        modules.insert(id.clone(), Arc::new(LocalInstance::new(id, state)));
        true
    }

    fn del(&self, id: &ModuleId) -> bool {
        let Some(instance) = self.modules.write().remove(id) else {
            return false;
        };
        if instance.runtime.lock().take().is_some() {
            warn!(module = %id, "Deleted a running module, detaching its task");
        }
        debug!(module = %id, "Module deleted");
        true
    }

    async fn start(&self, id: &ModuleId) -> Result<()> {
        let instance = self.require(id)?;
        if instance.runtime.lock().is_some() {
            return Err(LoaderError::AlreadyRunning(id.clone()));
        }

        if let Some(dir) = self.module_dir(id) {
            if let Err(e) = materialize(id, &dir, &instance.state).await {
                instance.set_status(ModuleStatus::Failed);
                return Err(e);
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drain_control(
            id.clone(),
            rx,
            Arc::clone(&instance.current_config),
        ));

        {
            let mut runtime = instance.runtime.lock();
            if runtime.is_some() {
                task.abort();
                return Err(LoaderError::AlreadyRunning(id.clone()));
            }
            *runtime = Some(Runtime { control: tx, task });
        }
        instance.set_status(ModuleStatus::Running);

        info!(module = %id, "Module started");
        Ok(())
    }

    async fn stop(&self, id: &ModuleId) -> Result<()> {
        let instance = self.require(id)?;
        let runtime = instance.runtime.lock().take();
        let Some(runtime) = runtime else {
            // A failed instance has no task left to join.
            if instance.status() == ModuleStatus::Failed {
                instance.set_status(ModuleStatus::Stopped);
                debug!(module = %id, "Failed module settled as stopped");
                return Ok(());
            }
            return Err(LoaderError::NotRunning(id.clone()));
        };

        // Closing the channel ends the control task. Until it is joined the
        // instance counts as failed, which is where a dropped stop leaves it.
        drop(runtime.control);
        instance.set_status(ModuleStatus::Failed);
        if let Err(e) = runtime.task.await {
            return Err(LoaderError::Task {
                module: id.clone(),
                reason: e.to_string(),
            });
        }
        instance.set_status(ModuleStatus::Stopped);

        info!(module = %id, "Module stopped");
        Ok(())
    }

    async fn stop_all(&self) -> Result<()> {
        let running: Vec<ModuleId> = self
            .modules
            .read()
            .iter()
            .filter(|(_, instance)| instance.runtime.lock().is_some())
            .map(|(id, _)| id.clone())
            .collect();

        let mut first_error = None;
        for id in running {
            if let Err(e) = self.stop(&id).await {
                warn!(module = %id, error = %e, "Failed to stop module");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

struct Runtime {
    control: mpsc::UnboundedSender<ControlSignal>,
    task: JoinHandle<()>,
}

/// A module instance owned by [`LocalLoader`].
pub struct LocalInstance {
    id: ModuleId,
    state: ModuleState,
    status: RwLock<ModuleStatus>,
    current_config: Arc<RwLock<Vec<u8>>>,
    runtime: Mutex<Option<Runtime>>,
}

impl LocalInstance {
    fn new(id: ModuleId, state: ModuleState) -> Self {
        let current_config = state.config.config_item.current_config.clone().into_bytes();
        Self {
            id,
            state,
            status: RwLock::new(ModuleStatus::Stopped),
            current_config: Arc::new(RwLock::new(current_config)),
            runtime: Mutex::new(None),
        }
    }

    /// The state the module was added with.
    #[must_use]
    pub fn state(&self) -> &ModuleState {
        &self.state
    }

    /// The configuration last applied by an update-config signal.
    #[must_use]
    pub fn current_config(&self) -> Vec<u8> {
        self.current_config.read().clone()
    }

    fn set_status(&self, status: ModuleStatus) {
        *self.status.write() = status;
    }
}

impl ModuleInstance for LocalInstance {
    fn id(&self) -> &ModuleId {
        &self.id
    }

    fn status(&self) -> ModuleStatus {
        *self.status.read()
    }

    fn send_control(&self, signal: &str, payload: &[u8]) -> Result<()> {
        let runtime = self.runtime.lock();
        let runtime = runtime
            .as_ref()
            .ok_or_else(|| LoaderError::NotRunning(self.id.clone()))?;

        runtime
            .control
            .send(ControlSignal {
                signal: signal.to_string(),
                payload: payload.to_vec(),
            })
            .map_err(|_| LoaderError::ControlClosed(self.id.clone()))
    }
}

async fn drain_control(
    id: ModuleId,
    mut rx: mpsc::UnboundedReceiver<ControlSignal>,
    current_config: Arc<RwLock<Vec<u8>>>,
) {
    while let Some(signal) = rx.recv().await {
        debug!(module = %id, signal = %signal.signal, len = signal.payload.len(), "Control signal received");
        if signal.signal == UPDATE_CONFIG_SIGNAL {
            *current_config.write() = signal.payload;
        }
    }
    debug!(module = %id, "Control channel closed");
}

async fn materialize(id: &ModuleId, dir: &Path, state: &ModuleState) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    for (path, data) in &state.item.files {
        let relative = checked_relative(id, path)?;
        let target = dir.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, data).await?;
    }

    debug!(module = %id, dir = %dir.display(), files = state.item.files.len(), "Module materialized");
    Ok(())
}

/// Only plain relative paths may be written inside a module directory.
fn checked_relative<'a>(id: &ModuleId, path: &'a str) -> Result<&'a Path> {
    let relative = Path::new(path);
    let plain = !path.is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));

    if plain {
        Ok(relative)
    } else {
        Err(LoaderError::InvalidPath {
            module: id.clone(),
            path: path.to_string(),
        })
    }
}
