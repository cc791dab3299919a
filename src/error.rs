use thiserror::Error;

/// Main error type for the appkeeper daemon and its clients
#[derive(Debug, Error)]
pub enum AppKeeperError {
    // Process-related errors
    #[error("Failed to launch {0}: {1}")]
    LaunchFailure(String, String),

    #[error("Process {0} restarted too often and was suspended")]
    CrashLoopSuspended(String),

    #[error("Signal error: {0}")]
    SignalError(String),

    // Configuration errors
    #[error("Malformed config row at line {0}: {1}")]
    ConfigRowMalformed(usize, String),

    #[error("Config file {0} is unreadable: {1}")]
    ConfigFileUnreadable(String, String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IPC-related errors
    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Failed to connect to daemon: {0}")]
    ConnectionError(String),

    #[error("IPC protocol error: {0}")]
    ProtocolError(String),

    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Daemon already running (PID {0})")]
    DaemonAlreadyRunning(u32),

    #[error("Supervisor is no longer accepting requests")]
    SupervisorUnavailable,

    // Daemon lifecycle errors
    #[error("PID file error: {0}")]
    PidFileError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// Result type alias for appkeeper operations
pub type Result<T> = std::result::Result<T, AppKeeperError>;
