use crate::error::{AppKeeperError, Result};
use crate::process::types::LaunchSpec;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// A child that the OS confirmed as executing
#[derive(Debug)]
pub struct SpawnedProcess {
    /// The child process handle
    pub child: Child,

    /// Process ID assigned by the OS
    pub pid: u32,
}

/// Launch the program described by `spec`
///
/// The child gets null stdin, stdout and stderr; the daemon never reads
/// its output. The fork/exec runs on the blocking pool so the caller can
/// bound the wait with `start_timeout`. A child that only appears after
/// the timeout is killed once it shows up.
///
/// # Returns
/// * `Ok(SpawnedProcess)` - The program is executing
/// * `Err(AppKeeperError::LaunchFailure)` - The OS refused it or the wait elapsed
/// * `Err(AppKeeperError::InvalidConfig)` - The spec has no executable path
pub async fn spawn_process(spec: &LaunchSpec, start_timeout: Duration) -> Result<SpawnedProcess> {
    spec.validate()?;
    let label = spec.path.display().to_string();

    let mut command = Command::new(&spec.path);
    command
        .args(&spec.args)
        .current_dir(&spec.working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut launch = tokio::task::spawn_blocking(move || command.spawn());

    let child = match tokio::time::timeout(start_timeout, &mut launch).await {
        Ok(Ok(Ok(child))) => child,
        Ok(Ok(Err(e))) => return Err(AppKeeperError::LaunchFailure(label, e.to_string())),
        Ok(Err(e)) => return Err(AppKeeperError::LaunchFailure(label, e.to_string())),
        Err(_) => {
            tokio::spawn(async move {
                if let Ok(Ok(mut late)) = launch.await {
                    let _ = late.kill().await;
                }
            });
            return Err(AppKeeperError::LaunchFailure(
                label,
                format!("did not start within {:?}", start_timeout),
            ));
        }
    };

    let pid = child.id().ok_or_else(|| {
        AppKeeperError::LaunchFailure(label.clone(), "exited before a PID was assigned".to_string())
    })?;

    Ok(SpawnedProcess { child, pid })
}
