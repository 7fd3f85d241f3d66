//! Configuration for a broadside node

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides (`BROADSIDE_RANK=3`).
pub const ENV_PREFIX: &str = "BROADSIDE";

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Advertised address peers use to reach this node
    pub address: String,

    /// Election priority; lower wins
    pub rank: i64,

    /// Bind address for the RPC listener
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Coordinator to synchronize against on startup (self if absent)
    #[serde(default)]
    pub bootstrap: Option<String>,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Must stay strictly below the heartbeat interval
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,

    #[serde(default = "default_election_timeout")]
    pub election_timeout_ms: u64,

    #[serde(default = "default_broadcast_timeout")]
    pub broadcast_timeout_ms: u64,

    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_ms: u64,

    /// Concurrent background jobs (elections, broadcasts)
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Sled directory for player statistics; in-memory when unset
    #[serde(default)]
    pub stats_path: Option<PathBuf>,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}
fn default_heartbeat_interval() -> u64 {
    10_000
}
fn default_ping_timeout() -> u64 {
    5_000
}
fn default_election_timeout() -> u64 {
    3_000
}
fn default_broadcast_timeout() -> u64 {
    2_000
}
fn default_sync_timeout() -> u64 {
    3_000
}
fn default_worker_pool_size() -> usize {
    8
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub address: Option<String>,
    pub rank: Option<i64>,
    pub bind_addr: Option<String>,
    pub bootstrap: Option<String>,
    pub heartbeat_interval_ms: Option<u64>,
    pub stats_path: Option<String>,
}

impl NodeConfig {
    /// Config with defaults for everything but identity.
    pub fn new(address: impl Into<String>, rank: i64) -> Self {
        Self {
            address: normalize_address(&address.into()),
            rank,
            bind_addr: default_bind_addr(),
            bootstrap: None,
            heartbeat_interval_ms: default_heartbeat_interval(),
            ping_timeout_ms: default_ping_timeout(),
            election_timeout_ms: default_election_timeout(),
            broadcast_timeout_ms: default_broadcast_timeout(),
            sync_timeout_ms: default_sync_timeout(),
            worker_pool_size: default_worker_pool_size(),
            stats_path: None,
            log_level: default_log_level(),
        }
    }

    /// Layer an optional TOML file, `BROADSIDE_*` environment variables and
    /// CLI overrides, in that order.
    pub fn load(file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("address", overrides.address)?
            .set_override_option("rank", overrides.rank)?
            .set_override_option("bind_addr", overrides.bind_addr)?
            .set_override_option("bootstrap", overrides.bootstrap)?
            .set_override_option("heartbeat_interval_ms", overrides.heartbeat_interval_ms)?
            .set_override_option("stats_path", overrides.stats_path)?;

        let mut cfg: NodeConfig = builder.build()?.try_deserialize()?;
        cfg.address = normalize_address(&cfg.address);
        cfg.bootstrap = cfg
            .bootstrap
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .map(normalize_address);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(Error::InvalidConfig("address must not be empty".into()));
        }
        if self.ping_timeout_ms >= self.heartbeat_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "ping timeout ({}ms) must be shorter than the heartbeat interval ({}ms)",
                self.ping_timeout_ms, self.heartbeat_interval_ms
            )));
        }
        if self.worker_pool_size == 0 {
            return Err(Error::InvalidConfig("worker_pool_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Address of the initial coordinator.
    pub fn bootstrap_address(&self) -> String {
        self.bootstrap.clone().unwrap_or_else(|| self.address.clone())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn timeouts(&self) -> PeerTimeouts {
        PeerTimeouts {
            ping: Duration::from_millis(self.ping_timeout_ms),
            election: Duration::from_millis(self.election_timeout_ms),
            broadcast: Duration::from_millis(self.broadcast_timeout_ms),
            sync: Duration::from_millis(self.sync_timeout_ms),
        }
    }
}

/// Per-call timeouts for outbound peer calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerTimeouts {
    pub ping: Duration,
    pub election: Duration,
    pub broadcast: Duration,
    pub sync: Duration,
}

impl Default for PeerTimeouts {
    fn default() -> Self {
        Self {
            ping: Duration::from_millis(default_ping_timeout()),
            election: Duration::from_millis(default_election_timeout()),
            broadcast: Duration::from_millis(default_broadcast_timeout()),
            sync: Duration::from_millis(default_sync_timeout()),
        }
    }
}

/// Prefix `http://` when the address carries no scheme.
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("localhost:8000"), "http://localhost:8000");
        assert_eq!(normalize_address("https://a.example/"), "https://a.example");
        assert_eq!(normalize_address(" http://b:1 "), "http://b:1");
    }

    #[test]
    fn test_ping_timeout_must_be_shorter_than_tick() {
        let mut cfg = NodeConfig::new("a:1", 1);
        cfg.ping_timeout_ms = cfg.heartbeat_interval_ms;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));
        cfg.ping_timeout_ms = cfg.heartbeat_interval_ms - 1;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_file_with_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "address = \"node-a:8000\"\nrank = 5\nbootstrap = \"node-b:8000\"\nheartbeat_interval_ms = 2000\nping_timeout_ms = 500"
        )
        .unwrap();

        let cfg = NodeConfig::load(
            Some(file.path()),
            ConfigOverrides {
                rank: Some(7),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(cfg.address, "http://node-a:8000");
        assert_eq!(cfg.rank, 7);
        assert_eq!(cfg.bootstrap_address(), "http://node-b:8000");
        assert_eq!(cfg.heartbeat_interval(), Duration::from_millis(2000));
        assert_eq!(cfg.timeouts().ping, Duration::from_millis(500));
        assert_eq!(cfg.worker_pool_size, 8);
    }

    #[test]
    fn test_bootstrap_defaults_to_self() {
        let cfg = NodeConfig::new("localhost:9000", 1);
        assert_eq!(cfg.bootstrap_address(), "http://localhost:9000");
    }
}
