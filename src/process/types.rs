use crate::error::{AppKeeperError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a process is treated once it exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaunchMode {
    /// Start once, never restart
    RunOnce,
    /// Restart on every exit, subject to the restart window
    Monitor,
    /// Reserved for diagnostics; behaves like `RunOnce`
    Test,
}

impl LaunchMode {
    pub fn restarts_on_exit(&self) -> bool {
        matches!(self, LaunchMode::Monitor)
    }
}

impl TryFrom<i64> for LaunchMode {
    type Error = AppKeeperError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(LaunchMode::RunOnce),
            1 => Ok(LaunchMode::Monitor),
            2 => Ok(LaunchMode::Test),
            other => Err(AppKeeperError::InvalidConfig(format!(
                "unknown launch mode {} (expected 0, 1 or 2)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchMode::RunOnce => write!(f, "run-once"),
            LaunchMode::Monitor => write!(f, "monitor"),
            LaunchMode::Test => write!(f, "test"),
        }
    }
}

/// Where a managed process is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    Exited,
    Suspended,
}

impl LifecycleState {
    /// States in which an OS handle is held
    pub fn holds_handle(&self) -> bool {
        matches!(self, LifecycleState::Starting | LifecycleState::Running)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "idle"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Exited => write!(f, "exited"),
            LifecycleState::Suspended => write!(f, "suspended"),
        }
    }
}

/// Immutable description of how to start one program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// Executable to run
    pub path: PathBuf,

    /// Positional arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory; the invoking user's home when not given
    pub working_directory: PathBuf,

    /// Restart behavior
    pub mode: LaunchMode,
}

impl LaunchSpec {
    pub fn new<P: Into<PathBuf>>(
        path: P,
        args: Vec<String>,
        working_directory: Option<PathBuf>,
        mode: LaunchMode,
    ) -> Self {
        Self {
            path: path.into(),
            args,
            // An empty directory counts as unset
            working_directory: working_directory
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(home_directory),
            mode,
        }
    }

    /// Reject specs that can never be launched
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(AppKeeperError::InvalidConfig(
                "executable path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn set_working_directory<P: AsRef<Path>>(&mut self, dir: P) {
        self.working_directory = dir.as_ref().to_path_buf();
    }
}

/// Home directory of the user running the daemon
pub fn home_directory() -> PathBuf {
    #[cfg(unix)]
    {
        use nix::unistd::{getuid, User};
        if let Ok(Some(user)) = User::from_uid(getuid()) {
            return user.dir;
        }
    }

    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_integer() {
        assert_eq!(LaunchMode::try_from(0).unwrap(), LaunchMode::RunOnce);
        assert_eq!(LaunchMode::try_from(1).unwrap(), LaunchMode::Monitor);
        assert_eq!(LaunchMode::try_from(2).unwrap(), LaunchMode::Test);
        assert!(matches!(
            LaunchMode::try_from(3),
            Err(AppKeeperError::InvalidConfig(_))
        ));
        assert!(LaunchMode::try_from(-1).is_err());
    }

    #[test]
    fn test_only_monitor_restarts() {
        assert!(LaunchMode::Monitor.restarts_on_exit());
        assert!(!LaunchMode::RunOnce.restarts_on_exit());
        assert!(!LaunchMode::Test.restarts_on_exit());
    }

    #[test]
    fn test_spec_defaults_to_home_directory() {
        let spec = LaunchSpec::new("/bin/true", vec![], None, LaunchMode::RunOnce);
        assert_eq!(spec.working_directory, home_directory());
        assert!(spec.args.is_empty());
    }

    #[test]
    fn test_spec_keeps_explicit_directory() {
        let spec = LaunchSpec::new(
            "/bin/true",
            vec!["a".to_string()],
            Some(PathBuf::from("/tmp")),
            LaunchMode::Monitor,
        );
        assert_eq!(spec.working_directory, PathBuf::from("/tmp"));
        assert_eq!(spec.args, vec!["a".to_string()]);
    }

    #[test]
    fn test_empty_directory_means_home() {
        let spec = LaunchSpec::new(
            "/bin/true",
            vec![],
            Some(PathBuf::new()),
            LaunchMode::RunOnce,
        );
        assert_eq!(spec.working_directory, home_directory());
    }

    #[test]
    fn test_set_working_directory() {
        let mut spec = LaunchSpec::new("/bin/true", vec![], None, LaunchMode::RunOnce);
        spec.set_working_directory("/var");
        assert_eq!(spec.working_directory, PathBuf::from("/var"));
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let spec = LaunchSpec::new("", vec![], None, LaunchMode::RunOnce);
        assert!(spec.validate().is_err());

        let spec = LaunchSpec::new("/bin/true", vec![], None, LaunchMode::RunOnce);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_handle_states() {
        assert!(LifecycleState::Starting.holds_handle());
        assert!(LifecycleState::Running.holds_handle());
        assert!(!LifecycleState::Idle.holds_handle());
        assert!(!LifecycleState::Exited.holds_handle());
        assert!(!LifecycleState::Suspended.holds_handle());
    }
}
