//! End-to-end command handling through the connection supervisor.
//!
//! Commands are injected into an in-memory transport as if they came from
//! the server; responses are read back from the packets the agent sent.

use std::sync::Arc;

use fleet_agent_control::{
    AgentError, ConnectionSupervisor, Orchestrator, SupervisorState, MAIN_ENDPOINT,
};
use fleet_agent_core::{
    AgentInformation, ConfigItemUpdate, ModuleConfig, ModuleId, ModuleSpec, ModuleStatus,
    ModuleStatusEntry, NetInfo, OsInfo,
};
use fleet_agent_loader::{Loader, LoaderCall, MockLoader, UPDATE_CONFIG_SIGNAL};
use fleet_agent_proto::{Batch, Command, InvalidEntry, Response};
use fleet_agent_transport::{ConnectConfig, MemoryTransport, Packet};
use tokio::task::JoinHandle;

const SERVER: &str = "server";

// =============================================================================
// Harness
// =============================================================================

struct Agent {
    transport: Arc<MemoryTransport>,
    supervisor: Arc<ConnectionSupervisor<MemoryTransport, MockLoader>>,
    run: JoinHandle<fleet_agent_control::Result<()>>,
}

impl Agent {
    async fn start() -> Self {
        let transport = Arc::new(MemoryTransport::new());
        let info = Arc::new(AgentInformation {
            agent_id: "agent-1".to_string(),
            version: "1.2.3".to_string(),
            os: OsInfo {
                kind: "linux".to_string(),
                family: "unix".to_string(),
                arch: "x86_64".to_string(),
            },
            net: NetInfo {
                hostname: "edge-1".to_string(),
                ips: vec!["10.0.0.7".to_string()],
            },
            started_at: chrono::Utc::now(),
        });
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(MockLoader::new()), info));
        let connect = ConnectConfig {
            id: "agent-1".to_string(),
            token: String::new(),
            connection: "memory://server".to_string(),
        };
        let supervisor = Arc::new(ConnectionSupervisor::new(
            Arc::clone(&transport),
            orchestrator,
            connect,
        ));

        let mut states = supervisor.subscribe();
        let run = tokio::spawn({
            let supervisor = Arc::clone(&supervisor);
            async move { supervisor.run().await }
        });
        states
            .wait_for(|s| *s == SupervisorState::Connected)
            .await
            .unwrap();

        Self {
            transport,
            supervisor,
            run,
        }
    }

    fn loader(&self) -> &Arc<MockLoader> {
        self.supervisor.orchestrator().loader()
    }

    /// Inject raw bytes and wait for the next response.
    async fn send_raw(&self, data: Vec<u8>) -> Response {
        let before = self.transport.sent_data().len();
        assert!(
            self.transport
                .inject(Packet::data(MAIN_ENDPOINT, SERVER, "agent-1", data))
                .await
        );
        self.transport.wait_for_sent(before + 1).await;

        let sent = self.transport.sent_data();
        assert_eq!(sent.len(), before + 1, "exactly one response per command");
        let (dst, data) = sent.last().cloned().unwrap();
        assert_eq!(dst, SERVER);
        Response::decode(&data).unwrap()
    }

    async fn send(&self, command: Command) -> Vec<ModuleStatusEntry> {
        match self.send_raw(command.encode().unwrap()).await {
            Response::StatusModules(entries) => entries,
            Response::Information(_) => panic!("expected status response"),
        }
    }

    async fn stop(self) {
        self.supervisor.stop().await.unwrap();
        self.run.await.unwrap().unwrap();
    }
}

fn id(name: &str) -> ModuleId {
    ModuleId::new(name).unwrap()
}

fn spec(name: &str, version: &str) -> ModuleSpec {
    let mut config = ModuleConfig::new(id(name));
    config.version = version.to_string();
    ModuleSpec::new(config)
}

/// An entry the agent will decode as an unusable module name.
fn bad_name<T>() -> Result<T, InvalidEntry> {
    Err(InvalidEntry {
        name: "bad/name".to_string(),
        reason: "sent as is".to_string(),
    })
}

fn names(entries: &[ModuleStatusEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn get_information_reports_identity() {
    let agent = Agent::start().await;

    let Response::Information(info) = agent.send_raw(Command::GetInformation.encode().unwrap()).await
    else {
        panic!("expected information response");
    };
    assert_eq!(info.agent_id, "agent-1");
    assert_eq!(info.version, "1.2.3");
    assert_eq!(info.net.hostname, "edge-1");

    agent.stop().await;
}

#[tokio::test]
async fn status_skips_modules_unknown_to_registry() {
    let agent = Agent::start().await;
    agent.send(Command::StartModules(vec![spec("a", "1")].into())).await;

    // Known to the loader only.
    assert!(agent.loader().add(id("stray"), spec("stray", "1").to_state()));

    // Known to the registry only.
    agent
        .supervisor
        .orchestrator()
        .registry()
        .insert(ModuleConfig::new(id("orphan")));

    let status = agent.send(Command::GetStatusModules).await;
    assert_eq!(names(&status), vec!["a"]);

    agent.stop().await;
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn start_with_one_failure_still_starts_the_rest() {
    let agent = Agent::start().await;
    agent.loader().fail_start(&id("a"));

    let status = agent
        .send(Command::StartModules(vec![spec("a", "1"), spec("b", "1")].into()))
        .await;

    assert_eq!(names(&status), vec!["b"]);
    assert_eq!(status[0].status, ModuleStatus::Running);
    // The half-added entry is gone, so the name is free again.
    assert!(agent.loader().get(&id("a")).is_none());
    assert_eq!(agent.loader().count(&LoaderCall::Del(id("a"))), 1);

    agent.stop().await;
}

#[tokio::test]
async fn start_twice_starts_once() {
    let agent = Agent::start().await;

    agent.send(Command::StartModules(vec![spec("a", "1")].into())).await;
    let status = agent.send(Command::StartModules(vec![spec("a", "2")].into())).await;

    assert_eq!(status.len(), 1);
    assert_eq!(status[0].config.version, "1");
    assert_eq!(agent.loader().count(&LoaderCall::Start(id("a"))), 1);

    agent.stop().await;
}

#[tokio::test]
async fn stop_aborts_on_unknown_module() {
    let agent = Agent::start().await;
    agent
        .send(Command::StartModules(vec![
            spec("a", "1"),
            spec("b", "1"),
            spec("c", "1"),
        ]
        .into()))
        .await;

    let status = agent
        .send(Command::StopModules(vec![id("a"), id("ghost"), id("c")].into()))
        .await;

    // "a" stopped before the abort, "c" was never reached.
    assert_eq!(names(&status), vec!["b", "c"]);
    assert_eq!(agent.loader().count(&LoaderCall::Stop(id("c"))), 0);

    agent.stop().await;
}

#[tokio::test]
async fn start_skips_invalid_name_and_starts_the_rest() {
    let agent = Agent::start().await;

    let batch = Batch::new(vec![Ok(spec("a", "1")), bad_name(), Ok(spec("b", "1"))]);
    let status = agent.send(Command::StartModules(batch)).await;

    assert_eq!(names(&status), vec!["a", "b"]);
    assert!(status.iter().all(|e| e.status == ModuleStatus::Running));
    assert_eq!(agent.loader().count(&LoaderCall::Start(id("a"))), 1);
    assert_eq!(agent.loader().count(&LoaderCall::Start(id("b"))), 1);

    agent.stop().await;
}

#[tokio::test]
async fn stop_aborts_at_invalid_name() {
    let agent = Agent::start().await;
    agent
        .send(Command::StartModules(vec![spec("a", "1"), spec("b", "1")].into()))
        .await;

    let batch = Batch::new(vec![Ok(id("a")), bad_name(), Ok(id("b"))]);
    let status = agent.send(Command::StopModules(batch)).await;

    assert_eq!(names(&status), vec!["b"]);
    assert_eq!(agent.loader().count(&LoaderCall::Stop(id("a"))), 1);
    assert_eq!(agent.loader().count(&LoaderCall::Stop(id("b"))), 0);

    agent.stop().await;
}

#[tokio::test]
async fn update_aborts_on_unknown_module() {
    let agent = Agent::start().await;
    agent.send(Command::StartModules(vec![spec("a", "1")].into())).await;
    agent.loader().clear_calls();

    let status = agent
        .send(Command::UpdateModules(
            vec![spec("ghost", "1"), spec("a", "2")].into(),
        ))
        .await;

    assert!(agent.loader().calls().is_empty());
    assert_eq!(names(&status), vec!["a"]);
    assert_eq!(status[0].config.version, "1");

    agent.stop().await;
}

#[tokio::test]
async fn update_replaces_module_once() {
    let agent = Agent::start().await;
    agent.send(Command::StartModules(vec![spec("a", "1")].into())).await;
    agent.loader().clear_calls();

    let status = agent.send(Command::UpdateModules(vec![spec("a", "2")].into())).await;

    assert_eq!(status.len(), 1);
    assert_eq!(status[0].config.version, "2");
    assert_eq!(agent.loader().count(&LoaderCall::Stop(id("a"))), 1);
    assert_eq!(agent.loader().count(&LoaderCall::Start(id("a"))), 1);

    agent.stop().await;
}

#[tokio::test]
async fn update_config_signals_without_restart() {
    let agent = Agent::start().await;
    let mut config = ModuleConfig::new(id("a"));
    config.config_item.config_schema = "{\"type\":\"object\"}".to_string();
    config.config_item.current_config = "{}".to_string();
    agent
        .send(Command::StartModules(vec![ModuleSpec::new(config)].into()))
        .await;
    agent.loader().clear_calls();

    let update = ModuleSpec {
        config_item: ConfigItemUpdate {
            current_config: Some("{\"level\":3}".to_string()),
            ..ConfigItemUpdate::default()
        },
        ..spec("a", "")
    };
    let status = agent.send(Command::UpdateConfigModules(vec![update].into())).await;

    assert!(agent.loader().calls().is_empty());
    assert_eq!(
        agent.loader().instance(&id("a")).unwrap().controls(),
        vec![(UPDATE_CONFIG_SIGNAL.to_string(), b"{\"level\":3}".to_vec())]
    );
    let item = &status[0].config.config_item;
    assert_eq!(item.current_config, "{\"level\":3}");
    assert_eq!(item.config_schema, "{\"type\":\"object\"}");

    agent.stop().await;
}

#[tokio::test]
async fn update_config_aborts_before_later_modules() {
    let agent = Agent::start().await;
    agent
        .send(Command::StartModules(vec![spec("a", "1"), spec("b", "1")].into()))
        .await;
    // Known to both sides but no longer running.
    agent.loader().stop(&id("b")).await.unwrap();

    let update = |name: &str| ModuleSpec {
        config_item: ConfigItemUpdate {
            current_config: Some("{\"level\":3}".to_string()),
            ..ConfigItemUpdate::default()
        },
        ..spec(name, "")
    };

    let status = agent
        .send(Command::UpdateConfigModules(
            vec![update("ghost"), update("a")].into(),
        ))
        .await;
    assert_eq!(names(&status), vec!["a", "b"]);
    assert!(agent.loader().instance(&id("a")).unwrap().controls().is_empty());

    agent
        .send(Command::UpdateConfigModules(
            vec![update("b"), update("a")].into(),
        ))
        .await;
    assert!(agent.loader().instance(&id("a")).unwrap().controls().is_empty());
    assert!(agent.loader().instance(&id("b")).unwrap().controls().is_empty());

    agent.stop().await;
}

#[tokio::test]
async fn malformed_batch_payload_still_answers() {
    let agent = Agent::start().await;
    agent.send(Command::StartModules(vec![spec("a", "1")].into())).await;

    // Envelope { type: UpdateModules, payload: truncated module list }.
    let data = vec![0x08, 0x05, 0x12, 0x03, 0x0a, 0x05, 0x01];
    let Response::StatusModules(status) = agent.send_raw(data).await else {
        panic!("expected status response");
    };

    assert_eq!(names(&status), vec!["a"]);

    agent.stop().await;
}

#[tokio::test]
async fn undecodable_envelope_gets_no_answer() {
    let agent = Agent::start().await;
    let before = agent.transport.sent().len();

    assert!(
        agent
            .transport
            .inject(Packet::data(MAIN_ENDPOINT, SERVER, "agent-1", vec![0xff, 0xff]))
            .await
    );
    // A following command is still served, and is the only response.
    let status = agent.send(Command::GetStatusModules).await;
    assert!(status.is_empty());
    assert_eq!(agent.transport.sent().len(), before + 1);

    agent.stop().await;
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn stop_stops_every_module() {
    let agent = Agent::start().await;
    agent
        .send(Command::StartModules(vec![spec("a", "1"), spec("b", "1")].into()))
        .await;

    let supervisor = Arc::clone(&agent.supervisor);
    let loader = Arc::clone(agent.loader());
    agent.stop().await;

    assert_eq!(loader.count(&LoaderCall::StopAll), 1);
    assert_eq!(loader.module_count(), 0);
    assert!(supervisor.orchestrator().registry().is_empty());
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn failed_shutdown_leaves_agent_stopping() {
    let agent = Agent::start().await;
    agent.send(Command::StartModules(vec![spec("a", "1")].into())).await;
    agent.loader().fail_stop_all();

    let err = agent.supervisor.stop().await.unwrap_err();
    assert!(matches!(err, AgentError::Shutdown(_)));
    assert!(err.to_string().starts_with("modules didn't stop: "));
    assert_eq!(agent.supervisor.state(), SupervisorState::Stopping);
}
