//! The loader contract consumed by the orchestrator.

use std::sync::Arc;

use async_trait::async_trait;
use fleet_agent_core::{ModuleId, ModuleStatus};

use crate::Result;

pub use fleet_agent_core::ModuleState;

/// The `Loader` trait defines how module instances are materialized,
/// started and stopped.
///
/// The loader owns its instances. Callers keep only [`ModuleId`]s and the
/// handles returned by [`Loader::get`].
#[async_trait]
pub trait Loader: Send + Sync {
    /// List every module known to the loader, in a stable order.
    fn list(&self) -> Vec<ModuleId>;

    /// Get the handle of a known module.
    fn get(&self, id: &ModuleId) -> Option<Arc<dyn ModuleInstance>>;

    /// Add a module in the stopped state.
    ///
    /// Returns false if a module with that id is already known.
    fn add(&self, id: ModuleId, state: ModuleState) -> bool;

    /// Forget a module. A running instance is detached first.
    ///
    /// Returns false if the module was not known.
    fn del(&self, id: &ModuleId) -> bool;

    /// Materialize and start a module.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is unknown, already running, or
    /// cannot be materialized.
    async fn start(&self, id: &ModuleId) -> Result<()>;

    /// Stop a running module.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is unknown or not running.
    async fn stop(&self, id: &ModuleId) -> Result<()>;

    /// Stop every running module.
    ///
    /// # Errors
    ///
    /// Attempts every module and returns the first failure.
    async fn stop_all(&self) -> Result<()>;
}

/// Handle to one module instance.
pub trait ModuleInstance: Send + Sync {
    /// The module this instance belongs to.
    fn id(&self) -> &ModuleId;

    /// Current lifecycle status.
    fn status(&self) -> ModuleStatus;

    /// Deliver an in-band control signal to the running instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance is not running.
    fn send_control(&self, signal: &str, payload: &[u8]) -> Result<()>;
}

/// Mock loader for testing.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::LoaderError;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashSet};

    /// One recorded loader call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LoaderCall {
        /// `add` was called.
        Add(ModuleId),
        /// `del` was called.
        Del(ModuleId),
        /// `start` was called.
        Start(ModuleId),
        /// `stop` was called.
        Stop(ModuleId),
        /// `stop_all` was called.
        StopAll,
    }

    /// A mock loader that keeps instances in memory and records every call.
    #[derive(Default)]
    pub struct MockLoader {
        state: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        modules: BTreeMap<ModuleId, Arc<MockInstance>>,
        calls: Vec<LoaderCall>,
        fail_start: HashSet<ModuleId>,
        fail_stop: HashSet<ModuleId>,
        hang_start: HashSet<ModuleId>,
        fail_stop_all: bool,
    }

    enum StartPlan {
        Run,
        Hang,
    }

    impl MockLoader {
        /// Create a new mock loader.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every `start` of this module fail.
        pub fn fail_start(&self, id: &ModuleId) {
            self.state.lock().fail_start.insert(id.clone());
        }

        /// Make every `stop` of this module fail.
        pub fn fail_stop(&self, id: &ModuleId) {
            self.state.lock().fail_stop.insert(id.clone());
        }

        /// Make every `start` of this module block forever.
        pub fn hang_start(&self, id: &ModuleId) {
            self.state.lock().hang_start.insert(id.clone());
        }

        /// Make `stop_all` fail.
        pub fn fail_stop_all(&self) {
            self.state.lock().fail_stop_all = true;
        }

        /// Every call recorded so far.
        #[must_use]
        pub fn calls(&self) -> Vec<LoaderCall> {
            self.state.lock().calls.clone()
        }

        /// Forget the recorded calls.
        pub fn clear_calls(&self) {
            self.state.lock().calls.clear();
        }

        /// Number of recorded calls equal to `call`.
        #[must_use]
        pub fn count(&self, call: &LoaderCall) -> usize {
            self.state.lock().calls.iter().filter(|c| *c == call).count()
        }

        /// Get the concrete instance of a module.
        #[must_use]
        pub fn instance(&self, id: &ModuleId) -> Option<Arc<MockInstance>> {
            self.state.lock().modules.get(id).cloned()
        }

        /// Number of known modules.
        #[must_use]
        pub fn module_count(&self) -> usize {
            self.state.lock().modules.len()
        }

        fn set_status(&self, id: &ModuleId, status: ModuleStatus) -> Result<()> {
            let state = self.state.lock();
            let instance = state
                .modules
                .get(id)
                .ok_or_else(|| LoaderError::NotFound(id.clone()))?;
            *instance.status.lock() = status;
            Ok(())
        }
    }

    #[async_trait]
    impl Loader for MockLoader {
        fn list(&self) -> Vec<ModuleId> {
            self.state.lock().modules.keys().cloned().collect()
        }

        fn get(&self, id: &ModuleId) -> Option<Arc<dyn ModuleInstance>> {
            self.state
                .lock()
                .modules
                .get(id)
                .map(|instance| Arc::clone(instance) as Arc<dyn ModuleInstance>)
        }

        fn add(&self, id: ModuleId, module: ModuleState) -> bool {
            let mut state = self.state.lock();
            state.calls.push(LoaderCall::Add(id.clone()));

            if state.modules.contains_key(&id) {
                return false;
            }
            let instance = Arc::new(MockInstance {
                id: id.clone(),
                module,
                status: Mutex::new(ModuleStatus::Stopped),
                controls: Mutex::new(Vec::new()),
            });
            state.modules.insert(id, instance);
            true
        }

        fn del(&self, id: &ModuleId) -> bool {
            let mut state = self.state.lock();
            state.calls.push(LoaderCall::Del(id.clone()));
            state.modules.remove(id).is_some()
        }

        async fn start(&self, id: &ModuleId) -> Result<()> {
            let plan = {
                let mut state = self.state.lock();
                state.calls.push(LoaderCall::Start(id.clone()));

                if !state.modules.contains_key(id) {
                    return Err(LoaderError::NotFound(id.clone()));
                }
                if state.fail_start.contains(id) {
                    return Err(LoaderError::Failed(format!(
                        "injected start failure for {id}"
                    )));
                }
                if state.hang_start.contains(id) {
                    StartPlan::Hang
                } else {
                    StartPlan::Run
                }
            };

            if let StartPlan::Hang = plan {
                std::future::pending::<()>().await;
            }
            self.set_status(id, ModuleStatus::Running)
        }

        async fn stop(&self, id: &ModuleId) -> Result<()> {
            {
                let mut state = self.state.lock();
                state.calls.push(LoaderCall::Stop(id.clone()));

                if state.fail_stop.contains(id) {
                    return Err(LoaderError::Failed(format!(
                        "injected stop failure for {id}"
                    )));
                }
            }
            self.set_status(id, ModuleStatus::Stopped)
        }

        async fn stop_all(&self) -> Result<()> {
            let mut state = self.state.lock();
            state.calls.push(LoaderCall::StopAll);

            if state.fail_stop_all {
                return Err(LoaderError::Failed("injected stop_all failure".to_string()));
            }
            for instance in state.modules.values() {
                *instance.status.lock() = ModuleStatus::Stopped;
            }
            Ok(())
        }
    }

    /// An in-memory module instance.
    pub struct MockInstance {
        id: ModuleId,
        module: ModuleState,
        status: Mutex<ModuleStatus>,
        controls: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl MockInstance {
        /// The state the module was added with.
        #[must_use]
        pub fn state(&self) -> &ModuleState {
            &self.module
        }

        /// Every control signal delivered so far.
        #[must_use]
        pub fn controls(&self) -> Vec<(String, Vec<u8>)> {
            self.controls.lock().clone()
        }
    }

    impl ModuleInstance for MockInstance {
        fn id(&self) -> &ModuleId {
            &self.id
        }

        fn status(&self) -> ModuleStatus {
            *self.status.lock()
        }

        fn send_control(&self, signal: &str, payload: &[u8]) -> Result<()> {
            if self.status() != ModuleStatus::Running {
                return Err(LoaderError::NotRunning(self.id.clone()));
            }
            self.controls
                .lock()
                .push((signal.to_string(), payload.to_vec()));
            Ok(())
        }
    }
}
