// IPC Server - the control surface other local processes talk to

use crate::error::{AppKeeperError, Result};
use crate::ipc::{Command, LifecycleEvent, Request, Response, ResponseData};
use crate::process::supervisor::SupervisorHandle;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::{self, error::RecvError};

/// Default socket path for daemon communication
const DEFAULT_SOCKET_PATH: &str = "/tmp/appkeeper.sock";

/// Unix-socket control surface bound to a supervisor
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl IpcServer {
    /// Create a new IPC server with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(DEFAULT_SOCKET_PATH)
    }

    /// Create a new IPC server with a custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            socket_path: path.as_ref().to_path_buf(),
            listener: None,
        }
    }

    /// Bind the Unix socket; must run inside a tokio runtime
    pub fn start(&mut self) -> Result<()> {
        // Remove existing socket file if it exists
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                AppKeeperError::IpcError(format!("Failed to remove existing socket: {}", e))
            })?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .map_err(|e| AppKeeperError::IpcError(format!("Failed to bind to socket: {}", e)))?;

        // Owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, permissions).map_err(|e| {
                AppKeeperError::IpcError(format!("Failed to set socket permissions: {}", e))
            })?;
        }

        self.listener = Some(listener);
        Ok(())
    }

    /// Accept connections forever, serving each on its own task
    pub async fn run(&self, supervisor: SupervisorHandle) -> Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| AppKeeperError::IpcError("Server not started".to_string()))?;

        loop {
            let stream = match listener.accept().await {
                Ok((stream, _addr)) => stream,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let supervisor = supervisor.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, supervisor).await {
                    tracing::debug!("Control connection closed: {}", e);
                }
            });
        }
    }

    /// Stop the server and clean up the socket file
    pub fn stop(&mut self) -> Result<()> {
        self.listener = None;

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| {
                AppKeeperError::IpcError(format!("Failed to remove socket file: {}", e))
            })?;
        }

        Ok(())
    }

    /// Get the socket path being used
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        // Clean up socket file on drop
        let _ = self.stop();
    }
}

/// Serve newline-delimited requests until the peer hangs up
///
/// A `Subscribe` request turns the connection into a signal stream: after
/// the response every lifecycle event is written as one JSON line.
async fn serve_connection(stream: UnixStream, supervisor: SupervisorHandle) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| AppKeeperError::IpcError(format!("Failed to read request: {}", e)))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                let response = Response::error(0, format!("Malformed request: {}", e));
                write_line(&mut writer, &response).await?;
                continue;
            }
        };

        if let Command::Subscribe = request.command {
            // Subscribe before acknowledging so no signal slips between the two
            let signals = supervisor.subscribe();
            write_line(
                &mut writer,
                &Response::success(request.id, ResponseData::Subscribed),
            )
            .await?;
            return stream_signals(&mut writer, signals).await;
        }

        let response = match handle_command(request.command, &supervisor).await {
            Ok(data) => Response::success(request.id, data),
            Err(e) => Response::error(request.id, e.to_string()),
        };
        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

/// Execute a single non-streaming command against the supervisor
pub async fn handle_command(
    command: Command,
    supervisor: &SupervisorHandle,
) -> Result<ResponseData> {
    match command {
        Command::AppStart(opts) => {
            tracing::info!("AppStart requested for {}", opts.path.display());
            supervisor.launch_from_control_request(opts.working_directory, opts.path, opts.args)?;
            Ok(ResponseData::Accepted)
        }
        Command::Test => Ok(ResponseData::Alive),
        Command::List => Ok(ResponseData::ProcessList(supervisor.list().await?)),
        Command::Subscribe => Err(AppKeeperError::ProtocolError(
            "Subscribe must be sent as its own request".to_string(),
        )),
    }
}

async fn stream_signals(
    writer: &mut OwnedWriteHalf,
    mut signals: broadcast::Receiver<LifecycleEvent>,
) -> Result<()> {
    loop {
        match signals.recv().await {
            Ok(event) => write_line(writer, &event).await?,
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("Subscriber fell behind, {} signal(s) dropped", missed);
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> Result<()> {
    let mut json = serde_json::to_string(message).map_err(|e| {
        AppKeeperError::SerializationError(format!("Failed to serialize message: {}", e))
    })?;
    json.push('\n');

    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| AppKeeperError::IpcError(format!("Failed to write response: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| AppKeeperError::IpcError(format!("Failed to flush stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::supervisor::Supervisor;
    use tempfile::TempDir;

    #[test]
    fn test_server_creation() {
        let server = IpcServer::new();
        assert_eq!(server.socket_path(), Path::new(DEFAULT_SOCKET_PATH));
    }

    #[tokio::test]
    async fn test_server_start_stop() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("start_stop.sock");
        let mut server = IpcServer::with_socket_path(&socket_path);

        server.start().unwrap();
        assert!(socket_path.exists());

        server.stop().unwrap();
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_server_cleanup_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("drop.sock");
        {
            let mut server = IpcServer::with_socket_path(&socket_path);
            server.start().unwrap();
            assert!(socket_path.exists());
        }
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn test_run_requires_start() {
        let server = IpcServer::with_socket_path("/tmp/appkeeper_never_bound.sock");
        let supervisor = Supervisor::with_defaults();
        assert!(matches!(
            server.run(supervisor.handle()).await,
            Err(AppKeeperError::IpcError(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_test_command() {
        let supervisor = Supervisor::with_defaults();
        let data = handle_command(Command::Test, &supervisor.handle())
            .await
            .unwrap();
        assert!(matches!(data, ResponseData::Alive));
    }

    #[tokio::test]
    async fn test_handle_subscribe_is_rejected() {
        let supervisor = Supervisor::with_defaults();
        assert!(matches!(
            handle_command(Command::Subscribe, &supervisor.handle()).await,
            Err(AppKeeperError::ProtocolError(_))
        ));
    }
}
