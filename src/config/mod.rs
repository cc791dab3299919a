pub mod apps;

use crate::error::{AppKeeperError, Result};
use crate::process::restart::RestartPolicy;
use crate::process::supervisor::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use apps::{load_rows, parse_rows, ConfigRow, StartupEntry};

/// Daemon settings, read from an optional TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix socket of the control surface
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Single-instance PID file
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Line-oriented list of apps launched at startup
    #[serde(default = "default_apps_file")]
    pub apps_file: PathBuf,

    /// How long to wait for the OS to confirm a launch (milliseconds)
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,

    /// Length of the restart observation window (seconds)
    #[serde(default = "default_restart_window_secs")]
    pub restart_window_secs: u64,

    /// Restarts tolerated per window before a process is suspended
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions for serde
fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/appkeeper.sock")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/appkeeper.pid")
}

fn default_apps_file() -> PathBuf {
    PathBuf::from("/etc/appkeeper/apps.conf")
}

fn default_start_timeout_ms() -> u64 {
    30_000
}

fn default_restart_window_secs() -> u64 {
    10
}

fn default_max_restarts() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            pid_file: default_pid_file(),
            apps_file: default_apps_file(),
            start_timeout_ms: default_start_timeout_ms(),
            restart_window_secs: default_restart_window_secs(),
            max_restarts: default_max_restarts(),
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load settings from a TOML file and validate them
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppKeeperError::ConfigFileUnreadable(path.display().to_string(), e.to_string())
        })?;

        let config = Self::parse(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AppKeeperError::InvalidConfig(format!("Failed to parse TOML: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(AppKeeperError::InvalidConfig(
                "socket_path must not be empty".to_string(),
            ));
        }

        if self.pid_file.as_os_str().is_empty() {
            return Err(AppKeeperError::InvalidConfig(
                "pid_file must not be empty".to_string(),
            ));
        }

        if self.start_timeout_ms == 0 {
            return Err(AppKeeperError::InvalidConfig(
                "start_timeout_ms must be at least 1".to_string(),
            ));
        }

        if self.restart_window_secs == 0 {
            return Err(AppKeeperError::InvalidConfig(
                "restart_window_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::new(
            Duration::from_secs(self.restart_window_secs),
            self.max_restarts,
        )
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            restart_policy: self.restart_policy(),
            start_timeout: self.start_timeout(),
        }
    }
}
