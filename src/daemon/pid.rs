// PID file management for the single daemon instance

use crate::error::{AppKeeperError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default PID file location
const DEFAULT_PID_FILE: &str = "/tmp/appkeeper.pid";

/// Manages the daemon PID file
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a new PID file manager with default path
    pub fn new() -> Self {
        Self::with_path(DEFAULT_PID_FILE)
    }

    /// Create a new PID file manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Claim the PID file for this process
    ///
    /// Fails with [`AppKeeperError::DaemonAlreadyRunning`] when the file
    /// names a live process. A stale file is overwritten.
    pub fn acquire(self) -> Result<PidGuard> {
        if let Ok(pid) = self.read() {
            if pid != std::process::id() && is_process_alive(pid) {
                return Err(AppKeeperError::DaemonAlreadyRunning(pid));
            }
            tracing::warn!("Replacing stale PID file {} (PID {})", self.path.display(), pid);
        }

        self.write()?;
        Ok(PidGuard { file: self })
    }

    /// Write the current process PID to the file
    pub fn write(&self) -> Result<()> {
        let pid = std::process::id();
        fs::write(&self.path, pid.to_string())
            .map_err(|e| AppKeeperError::PidFileError(format!("Failed to write PID file: {}", e)))
    }

    /// Read the PID from the file
    pub fn read(&self) -> Result<u32> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| AppKeeperError::PidFileError(format!("Failed to read PID file: {}", e)))?;

        content
            .trim()
            .parse::<u32>()
            .map_err(|e| AppKeeperError::PidFileError(format!("Invalid PID in file: {}", e)))
    }

    /// Check if the PID file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove the PID file
    pub fn remove(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                AppKeeperError::PidFileError(format!("Failed to remove PID file: {}", e))
            })?;
        }
        Ok(())
    }

    /// Whether the file names a process that is still alive
    pub fn is_daemon_running(&self) -> bool {
        match self.read() {
            Ok(pid) => is_process_alive(pid),
            Err(_) => false,
        }
    }

    /// Get the path to the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for PidFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the daemon's lifetime; removes the PID file on drop
pub struct PidGuard {
    file: PidFile,
}

impl PidGuard {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.remove() {
            tracing::warn!("{}", e);
        }
    }
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // A `None` signal only probes for existence
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}
