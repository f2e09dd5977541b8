//! Host and agent identity.

use std::net::UdpSocket;

use chrono::{DateTime, Utc};
use fleet_agent_core::{AgentInformation, NetInfo, OsInfo};

/// Source of the identity reported by get-information commands.
pub trait InfoProvider: Send + Sync {
    /// Gather the current identity.
    fn information(&self) -> AgentInformation;
}

impl InfoProvider for AgentInformation {
    fn information(&self) -> AgentInformation {
        self.clone()
    }
}

/// Reads identity from the running host.
#[derive(Debug, Clone)]
pub struct HostInfoProvider {
    agent_id: String,
    version: String,
    started_at: DateTime<Utc>,
}

impl HostInfoProvider {
    /// Create a provider for this process, started now.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }
}

impl InfoProvider for HostInfoProvider {
    fn information(&self) -> AgentInformation {
        AgentInformation {
            agent_id: self.agent_id.clone(),
            version: self.version.clone(),
            os: OsInfo {
                kind: std::env::consts::OS.to_string(),
                family: std::env::consts::FAMILY.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            },
            net: NetInfo {
                hostname: hostname(),
                ips: outbound_ip().into_iter().collect(),
            },
            started_at: self.started_at,
        }
    }
}

fn hostname() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|name| name.trim().to_string())
        })
        .unwrap_or_default()
}

/// Address of the interface used for outbound traffic. No packet is sent.
fn outbound_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then(|| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_info_reports_identity() {
        let provider = HostInfoProvider::new("agent-1");
        let info = provider.information();

        assert_eq!(info.agent_id, "agent-1");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.os.kind, std::env::consts::OS);
        assert_eq!(info.os.arch, std::env::consts::ARCH);
        assert!(info.started_at <= Utc::now());
    }

    #[test]
    fn start_time_is_stable() {
        let provider = HostInfoProvider::new("agent-1");
        assert_eq!(
            provider.information().started_at,
            provider.information().started_at
        );
    }
}
