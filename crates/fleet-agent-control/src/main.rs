//! Fleet agent - module lifecycle agent.
//!
//! This is the entry point for the `fleet-agent` binary. It connects to the
//! server, serves module commands and stops every module on Ctrl-C.
//!
//! Configuration is layered: defaults, then the `--config` JSON file, then
//! flags, then environment variables (`AGENT_ID`, `CONNECT`, `AGENT_TOKEN`,
//! `DEBUG`, `LOG_DIR`, `WORK_DIR`).

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fleet_agent_control::{AgentConfig, AgentService};

/// Log file created in the log directory.
const LOG_FILE: &str = "agent.log";

/// Fleet agent - runs modules on behalf of the fleet server.
#[derive(Parser, Debug)]
#[command(name = "fleet-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server connection string.
    #[arg(long)]
    connect: Option<String>,

    /// Agent identifier.
    #[arg(long)]
    agent: Option<String>,

    /// Directory for the agent log file.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Directory modules are materialized under.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    /// Run as a service: log to the log file only.
    #[arg(long, default_value = "false")]
    service: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(AgentConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_file(path)?,
            None => AgentConfig::default(),
        };

        if let Some(connection) = self.connect {
            config.connection = connection;
        }
        if let Some(agent_id) = self.agent {
            config.agent_id = agent_id;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir;
        }
        if self.work_dir.is_some() {
            config.work_dir = self.work_dir;
        }
        config.debug |= self.debug;

        config.apply_env();
        Ok((config, self.service))
    }
}

fn init_tracing(config: &AgentConfig, service: bool) -> anyhow::Result<()> {
    let default_filter = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let file_layer = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log dir {}", dir.display()))?;
            let path = dir.join(LOG_FILE);
            let file = File::options()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };
    let stdout_layer = (!service || file_layer.is_none()).then(fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    Ok(())
}

async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let service = AgentService::new(config)?;
    service.start().await.context("failed to start agent")?;
    tracing::info!("Agent started, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    service.stop().await.context("failed to stop agent")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, service) = Args::parse().into_config()?;
    init_tracing(&config, service)?;

    tracing::info!(
        agent_id = %config.agent_id,
        connection = %config.connection,
        log_dir = ?config.log_dir,
        work_dir = ?config.work_dir,
        "Fleet agent configuration loaded"
    );

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Fleet agent failed");
        return Err(e);
    }
    tracing::info!("Fleet agent stopped");
    Ok(())
}
