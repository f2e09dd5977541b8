//! Agent configuration types.
//!
//! Values are layered: defaults, then an optional JSON file, then
//! command-line flags, then environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AgentError, Result};

/// Configuration for the agent service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentConfig {
    /// Agent identifier announced to the server.
    #[serde(default = "AgentConfig::default_agent_id")]
    pub agent_id: String,

    /// Server connection string (e.g., `ws://localhost:8080`).
    #[serde(default = "AgentConfig::default_connection")]
    pub connection: String,

    /// Bearer token sent on connect. Empty means none.
    #[serde(default)]
    pub token: String,

    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Directory for `agent.log`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Directory modules are materialized under.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Wait between connect attempts in seconds.
    #[serde(default = "AgentConfig::default_reconnect_interval")]
    pub reconnect_interval_seconds: u64,

    /// Deadline for a single loader call in seconds. Zero disables it.
    #[serde(default = "AgentConfig::default_loader_timeout")]
    pub loader_timeout_seconds: u64,
}

impl AgentConfig {
    fn default_agent_id() -> String {
        "testid".to_string()
    }

    fn default_connection() -> String {
        "ws://localhost:8080".to_string()
    }

    const fn default_reconnect_interval() -> u64 {
        5
    }

    const fn default_loader_timeout() -> u64 {
        60
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| AgentError::Config(format!("{}: {e}", path.display())))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(agent_id) = var("AGENT_ID") {
            self.agent_id = agent_id;
        }
        if let Some(connection) = var("CONNECT") {
            self.connection = connection;
        }
        if let Some(token) = var("AGENT_TOKEN") {
            self.token = token;
        }
        if var("DEBUG").is_some() {
            self.debug = true;
        }
        if let Some(dir) = var("LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = var("WORK_DIR") {
            self.work_dir = Some(PathBuf::from(dir));
        }
    }

    /// Get the reconnect interval as a `Duration`.
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_seconds)
    }

    /// Get the loader deadline, if enabled.
    #[must_use]
    pub fn loader_timeout(&self) -> Option<Duration> {
        (self.loader_timeout_seconds > 0).then(|| Duration::from_secs(self.loader_timeout_seconds))
    }

    /// Check the configuration for values the agent cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(AgentError::Config("agent_id must not be empty".to_string()));
        }
        if self.connection.trim().is_empty() {
            return Err(AgentError::Config("connection must not be empty".to_string()));
        }
        if self.reconnect_interval_seconds == 0 {
            return Err(AgentError::Config(
                "reconnect_interval_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: Self::default_agent_id(),
            connection: Self::default_connection(),
            token: String::new(),
            debug: false,
            log_dir: None,
            work_dir: None,
            reconnect_interval_seconds: Self::default_reconnect_interval(),
            loader_timeout_seconds: Self::default_loader_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.agent_id, "testid");
        assert_eq!(config.connection, "ws://localhost:8080");
        assert!(config.token.is_empty());
        assert!(!config.debug);
        assert_eq!(config.reconnect_interval(), Duration::from_secs(5));
        assert_eq!(config.loader_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_loader_timeout_disables_deadline() {
        let config = AgentConfig {
            loader_timeout_seconds: 0,
            ..AgentConfig::default()
        };
        assert_eq!(config.loader_timeout(), None);
    }

    #[test]
    fn file_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"agent_id": "edge-7", "work_dir": "/var/lib/agent"}}"#).unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.agent_id, "edge-7");
        assert_eq!(config.work_dir, Some(PathBuf::from("/var/lib/agent")));
        assert_eq!(config.connection, "ws://localhost:8080");
        assert_eq!(config.reconnect_interval_seconds, 5);
    }

    #[test]
    fn bad_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AgentConfig::from_file(file.path()),
            Err(AgentError::Config(_))
        ));

        assert!(matches!(
            AgentConfig::from_file("/nonexistent/agent.json"),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AGENT_ID", "from-env"),
            ("CONNECT", "wss://server:443"),
            ("AGENT_TOKEN", "secret"),
            ("DEBUG", "1"),
            ("LOG_DIR", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AgentConfig::default();
        config.apply_env_from(|key| env.get(key).map(ToString::to_string));

        assert_eq!(config.agent_id, "from-env");
        assert_eq!(config.connection, "wss://server:443");
        assert_eq!(config.token, "secret");
        assert!(config.debug);
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn validate_rejects_empty_id() {
        let config = AgentConfig {
            agent_id: " ".to_string(),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(AgentConfig::default().validate().is_ok());

        let config = AgentConfig {
            reconnect_interval_seconds: 0,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
