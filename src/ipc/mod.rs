// IPC module - the daemon's control surface

pub mod client;
pub mod protocol;
pub mod server;

pub use client::IpcClient;
pub use protocol::{
    AppStartOptions, Command, LifecycleEvent, LifecycleKind, ProcessId, ProcessInfo, Request,
    Response, ResponseData,
};
pub use server::IpcServer;
