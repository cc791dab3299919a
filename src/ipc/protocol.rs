// Control-surface protocol: newline-delimited JSON over a Unix socket

use crate::process::types::{LaunchMode, LifecycleState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a managed process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl ProcessId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of an outward lifecycle signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    Started,
    Exited,
    Errored,
}

impl std::fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleKind::Started => write!(f, "started"),
            LifecycleKind::Exited => write!(f, "exited"),
            LifecycleKind::Errored => write!(f, "errored"),
        }
    }
}

/// Lifecycle signal broadcast to subscribers, tagged with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: ProcessId,
    pub kind: LifecycleKind,
    pub path: PathBuf,
}

/// Arguments of an `AppStart` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppStartOptions {
    pub path: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<PathBuf>,
}

/// All available commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Launch a program once; answered before the launch completes
    AppStart(AppStartOptions),
    /// Liveness probe
    Test,
    /// Snapshot of every managed process
    List,
    /// Keep the connection open and stream lifecycle signals
    Subscribe,
}

/// Process information returned by `List`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub id: ProcessId,
    pub path: PathBuf,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
    pub mode: LaunchMode,
    pub state: LifecycleState,
    pub pid: Option<u32>,
    /// Restarts inside the current observation window
    pub restarts: usize,
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseData {
    /// Launch request queued
    Accepted,
    /// Answer to `Test`
    Alive,
    /// List of all managed processes
    ProcessList(Vec<ProcessInfo>),
    /// Lifecycle events follow on this connection
    Subscribed,
}

/// Request message from client to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub command: Command,
}

/// Response message from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<ResponseData, String>,
}

impl Request {
    pub fn new(id: u64, command: Command) -> Self {
        Self { id, command }
    }
}

impl Response {
    pub fn success(id: u64, data: ResponseData) -> Self {
        Self {
            id,
            result: Ok(data),
        }
    }

    pub fn error(id: u64, error: String) -> Self {
        Self {
            id,
            result: Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_start_optional_fields() {
        let json = r#"{"id":3,"command":{"AppStart":{"path":"/usr/bin/app"}}}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.id, 3);
        match request.command {
            Command::AppStart(opts) => {
                assert_eq!(opts.path, PathBuf::from("/usr/bin/app"));
                assert!(opts.args.is_empty());
                assert!(opts.working_directory.is_none());
            }
            other => panic!("Expected AppStart, got {:?}", other),
        }
    }

    #[test]
    fn test_signal_kind_wire_names() {
        let event = LifecycleEvent {
            id: ProcessId::new(7),
            kind: LifecycleKind::Errored,
            path: PathBuf::from("/bin/false"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""kind":"errored""#));
        assert!(json.contains(r#""id":7"#));
    }

    #[test]
    fn test_process_id_display() {
        assert_eq!(ProcessId::new(42).to_string(), "42");
        assert_eq!(ProcessId::new(42).as_u64(), 42);
    }
}
