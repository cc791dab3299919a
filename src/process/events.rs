// Events delivered to the supervisor loop

use crate::ipc::protocol::{ProcessId, ProcessInfo};
use crate::process::types::LaunchSpec;
use std::process::ExitStatus;
use tokio::sync::{mpsc, oneshot};

/// Everything the supervisor loop reacts to, in arrival order
#[derive(Debug)]
pub enum SupervisorEvent {
    /// Start a new managed process
    Launch {
        spec: LaunchSpec,
        reply: Option<oneshot::Sender<ProcessId>>,
    },
    /// The OS reported that a child terminated; `status` is `None` when a
    /// restart attempt failed to launch at all
    ChildExited {
        id: ProcessId,
        generation: u64,
        status: Option<ExitStatus>,
    },
    /// A restart observation window elapsed
    WindowClosed { id: ProcessId },
    /// Registry snapshot request
    Snapshot {
        reply: oneshot::Sender<Vec<ProcessInfo>>,
    },
    /// Stop the loop and terminate every child
    Shutdown { reply: Option<oneshot::Sender<()>> },
}

pub type EventSender = mpsc::UnboundedSender<SupervisorEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SupervisorEvent>;

/// Human-readable exit description for logs
pub fn describe_exit(status: Option<&ExitStatus>) -> String {
    let Some(status) = status else {
        return "failed to launch".to_string();
    };

    if let Some(code) = status.code() {
        return format!("exit code {}", code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {}", signal);
        }
    }

    "unknown status".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_launch_failure() {
        assert_eq!(describe_exit(None), "failed to launch");
    }

    #[cfg(unix)]
    #[test]
    fn test_describe_exit_code_and_signal() {
        use std::os::unix::process::ExitStatusExt;

        let exited = ExitStatus::from_raw(3 << 8);
        assert_eq!(describe_exit(Some(&exited)), "exit code 3");

        let killed = ExitStatus::from_raw(9);
        assert_eq!(describe_exit(Some(&killed)), "signal 9");
    }
}
