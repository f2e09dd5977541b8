//! Static host and agent identity reported to the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity information answered to a get-information command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInformation {
    /// Agent identity string.
    pub agent_id: String,
    /// Agent version.
    pub version: String,
    /// Operating system information.
    pub os: OsInfo,
    /// Network information.
    pub net: NetInfo,
    /// When the agent process started.
    pub started_at: DateTime<Utc>,
}

/// Operating system information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    /// OS type (e.g. `linux`, `windows`, `macos`).
    pub kind: String,
    /// OS family (e.g. `unix`, `windows`).
    pub family: String,
    /// CPU architecture (e.g. `x86_64`, `aarch64`).
    pub arch: String,
}

/// Network information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInfo {
    /// Host name, empty when it cannot be determined.
    pub hostname: String,
    /// Known IP addresses.
    pub ips: Vec<String>,
}
