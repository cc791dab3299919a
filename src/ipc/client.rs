// IPC Client - talks to the daemon's control surface

use crate::error::{AppKeeperError, Result};
use crate::ipc::{Command, LifecycleEvent, Request, Response, ResponseData};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default socket path for daemon communication
const DEFAULT_SOCKET_PATH: &str = "/tmp/appkeeper.sock";

/// Maximum number of connection retry attempts
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Delay between retry attempts
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Blocking client for the control surface
pub struct IpcClient {
    socket_path: PathBuf,
    request_id: AtomicU64,
}

impl IpcClient {
    /// Create a new IPC client with the default socket path
    pub fn new() -> Self {
        Self::with_socket_path(DEFAULT_SOCKET_PATH)
    }

    /// Create a new IPC client with a custom socket path
    pub fn with_socket_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            socket_path: path.as_ref().to_path_buf(),
            request_id: AtomicU64::new(1),
        }
    }

    /// Send a command to the daemon and wait for a response
    pub fn send_command(&self, command: Command) -> Result<Response> {
        let request = Request::new(self.next_request_id(), command);

        let mut last_error = None;
        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            match self.try_send_request(&request) {
                Ok(response) => return Ok(response),
                Err(AppKeeperError::DaemonNotRunning) => return Err(AppKeeperError::DaemonNotRunning),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < MAX_RETRY_ATTEMPTS {
                        std::thread::sleep(RETRY_DELAY);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppKeeperError::ConnectionError("Failed to connect after retries".to_string())
        }))
    }

    /// Subscribe to lifecycle signals and hand each one to `on_event`
    ///
    /// Blocks until the daemon closes the connection or `on_event`
    /// returns `false`.
    pub fn subscribe<F>(&self, mut on_event: F) -> Result<()>
    where
        F: FnMut(LifecycleEvent) -> bool,
    {
        let request = Request::new(self.next_request_id(), Command::Subscribe);
        let mut stream = self.connect()?;
        write_request(&mut stream, &request)?;

        let mut reader = BufReader::new(stream);
        let response = read_response(&mut reader, request.id)?;
        match response.result {
            Ok(ResponseData::Subscribed) => {}
            Ok(other) => {
                return Err(AppKeeperError::ProtocolError(format!(
                    "Unexpected subscribe response: {:?}",
                    other
                )))
            }
            Err(message) => return Err(AppKeeperError::IpcError(message)),
        }

        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| AppKeeperError::IpcError(format!("Failed to read signal: {}", e)))?;
            if read == 0 {
                return Ok(());
            }

            let event: LifecycleEvent = serde_json::from_str(&line).map_err(|e| {
                AppKeeperError::DeserializationError(format!("Failed to deserialize signal: {}", e))
            })?;
            if !on_event(event) {
                return Ok(());
            }
        }
    }

    /// Get the socket path being used
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Attempt to send a request to the daemon (single attempt)
    fn try_send_request(&self, request: &Request) -> Result<Response> {
        let mut stream = self.connect()?;
        write_request(&mut stream, request)?;

        let mut reader = BufReader::new(stream);
        read_response(&mut reader, request.id)
    }

    /// Establish a connection to the daemon's Unix socket
    fn connect(&self) -> Result<UnixStream> {
        if !self.socket_path.exists() {
            return Err(AppKeeperError::DaemonNotRunning);
        }

        UnixStream::connect(&self.socket_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused
                || e.kind() == std::io::ErrorKind::NotFound
            {
                AppKeeperError::DaemonNotRunning
            } else {
                AppKeeperError::ConnectionError(format!("Failed to connect to daemon: {}", e))
            }
        })
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

fn write_request(stream: &mut UnixStream, request: &Request) -> Result<()> {
    let request_json = serde_json::to_string(request).map_err(|e| {
        AppKeeperError::SerializationError(format!("Failed to serialize request: {}", e))
    })?;

    writeln!(stream, "{}", request_json)
        .map_err(|e| AppKeeperError::IpcError(format!("Failed to write request: {}", e)))?;
    stream
        .flush()
        .map_err(|e| AppKeeperError::IpcError(format!("Failed to flush stream: {}", e)))
}

fn read_response(reader: &mut BufReader<UnixStream>, expected_id: u64) -> Result<Response> {
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| AppKeeperError::IpcError(format!("Failed to read response: {}", e)))?;

    let response: Response = serde_json::from_str(&response_line).map_err(|e| {
        AppKeeperError::DeserializationError(format!("Failed to deserialize response: {}", e))
    })?;

    if response.id != expected_id {
        return Err(AppKeeperError::ProtocolError(format!(
            "Response ID mismatch: expected {}, got {}",
            expected_id, response.id
        )));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = IpcClient::new();
        assert_eq!(client.socket_path(), Path::new(DEFAULT_SOCKET_PATH));
    }

    #[test]
    fn test_request_ids_increase() {
        let client = IpcClient::with_socket_path("/tmp/custom.sock");
        let first = client.next_request_id();
        assert_eq!(client.next_request_id(), first + 1);
    }

    #[test]
    fn test_daemon_not_running_error() {
        let client = IpcClient::with_socket_path("/tmp/appkeeper_nonexistent.sock");
        match client.send_command(Command::Test) {
            Err(AppKeeperError::DaemonNotRunning) => {}
            other => panic!("Expected DaemonNotRunning error, got: {:?}", other),
        }
        assert!(matches!(
            client.subscribe(|_| true),
            Err(AppKeeperError::DaemonNotRunning)
        ));
    }
}
