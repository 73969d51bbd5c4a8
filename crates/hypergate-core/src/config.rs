//! Gateway configuration resolution.
//!
//! Configuration arrives as plain environment-style key/values (the binary's
//! CLI layer maps env vars onto [`GatewayConfig`]) and resolves in two steps:
//! 1. Built-in defaults (`hyperspace` host, `~/.hyperspace/storage`)
//! 2. Simulation-mode overrides (per-process host id, memory storage)

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Host identifier the daemon itself defaults to when none is configured.
pub const DEFAULT_HOST: &str = "hyperspace";

/// Raw gateway configuration, prior to mode resolution.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Raw `SIMULATE_HYPERSPACE` value. Simulation mode iff exactly `"1"`.
    pub simulate: Option<String>,
    /// `HYPERSPACE_HOST`: daemon host identifier.
    pub host: Option<String>,
    /// `HYPERSPACE_STORAGE`: daemon storage directory.
    pub storage: Option<PathBuf>,
    /// `ATEK_ASSIGNED_PORT`: HTTP listen port.
    pub http_port: u16,
    /// Upper bound on each startup readiness wait.
    pub startup_timeout: Duration,
    /// Upper bound on each RPC socket dial.
    pub dial_timeout: Duration,
    /// Grace period for daemon termination before it is killed.
    pub terminate_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            simulate: None,
            host: None,
            storage: None,
            http_port: 0,
            startup_timeout: Duration::from_secs(60),
            dial_timeout: Duration::from_secs(10),
            terminate_timeout: Duration::from_secs(60),
        }
    }
}

/// Operating mode resolved from the raw configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Attach to (or spawn) a daemon on the configured host and storage.
    Normal,
    /// Self-contained stack: private bootstrap node, ephemeral daemon.
    Simulation,
}

/// Daemon storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Persistent on-disk storage rooted at the given directory.
    Disk(PathBuf),
    /// Ephemeral in-memory storage (simulation mode).
    Memory,
}

impl Storage {
    /// Short description used in status payloads and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Disk(path) => path.display().to_string(),
            Self::Memory => "memory".to_string(),
        }
    }
}

/// Fully resolved configuration the gateway runs with.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Operating mode.
    pub mode: Mode,
    /// Daemon host identifier (per-process-unique when simulating).
    pub host: String,
    /// Daemon storage backend.
    pub storage: Storage,
    /// HTTP listen port.
    pub http_port: u16,
    /// Upper bound on each startup readiness wait.
    pub startup_timeout: Duration,
    /// Upper bound on each RPC socket dial.
    pub dial_timeout: Duration,
    /// Grace period for daemon termination before it is killed.
    pub terminate_timeout: Duration,
}

/// Host identifier used when simulating, unique per gateway process.
pub fn simulation_host(pid: u32) -> String {
    format!("hyperspace-simulator-{pid}")
}

/// Default on-disk storage directory (`~/.hyperspace/storage`).
pub fn default_storage_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".hyperspace").join("storage"))
}

impl GatewayConfig {
    /// Resolve mode, host and storage for the given process id.
    ///
    /// Simulation mode ignores any configured host and storage: each
    /// simulating process gets its own host identifier and an in-memory
    /// backend, so two simulators never share state.
    pub fn resolve(self, pid: u32) -> Result<ResolvedConfig> {
        let simulate = self.simulate.as_deref() == Some("1");
        let (mode, host, storage) = if simulate {
            (Mode::Simulation, simulation_host(pid), Storage::Memory)
        } else {
            let host = self.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
            let storage = match self.storage {
                Some(dir) => Storage::Disk(dir),
                None => Storage::Disk(default_storage_dir().ok_or_else(|| {
                    Error::Config(
                        "cannot determine a home directory for default daemon storage".to_string(),
                    )
                })?),
            };
            (Mode::Normal, host, storage)
        };
        Ok(ResolvedConfig {
            mode,
            host,
            storage,
            http_port: self.http_port,
            startup_timeout: self.startup_timeout,
            dial_timeout: self.dial_timeout,
            terminate_timeout: self.terminate_timeout,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base_config() -> GatewayConfig {
        GatewayConfig {
            storage: Some(PathBuf::from("/var/lib/hyperspace")),
            http_port: 8080,
            ..GatewayConfig::default()
        }
    }

    #[test]
    fn simulation_requires_exact_flag_value() {
        for not_simulating in [None, Some("0"), Some("true"), Some(""), Some("1 ")] {
            let config = GatewayConfig {
                simulate: not_simulating.map(str::to_string),
                ..base_config()
            };
            assert_eq!(config.resolve(42).unwrap().mode, Mode::Normal, "{not_simulating:?}");
        }

        let config = GatewayConfig { simulate: Some("1".to_string()), ..base_config() };
        assert_eq!(config.resolve(42).unwrap().mode, Mode::Simulation);
    }

    #[test]
    fn simulation_overrides_host_and_storage() {
        let config = GatewayConfig {
            simulate: Some("1".to_string()),
            host: Some("production-host".to_string()),
            ..base_config()
        };
        let resolved = config.resolve(1234).unwrap();
        assert_eq!(resolved.host, "hyperspace-simulator-1234");
        assert_eq!(resolved.storage, Storage::Memory);
    }

    #[test]
    fn simulation_hosts_are_unique_per_process() {
        assert_ne!(simulation_host(100), simulation_host(101));
    }

    #[test]
    fn normal_mode_keeps_configured_host_and_storage() {
        let config = GatewayConfig { host: Some("my-daemon".to_string()), ..base_config() };
        let resolved = config.resolve(42).unwrap();
        assert_eq!(resolved.mode, Mode::Normal);
        assert_eq!(resolved.host, "my-daemon");
        assert_eq!(resolved.storage, Storage::Disk(PathBuf::from("/var/lib/hyperspace")));
    }

    #[test]
    fn normal_mode_defaults_host() {
        let resolved = base_config().resolve(42).unwrap();
        assert_eq!(resolved.host, DEFAULT_HOST);
    }
}
