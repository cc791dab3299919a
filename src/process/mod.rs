// Process module - launching, watching and restarting managed apps

pub mod events;
mod manager;
pub mod restart;
pub mod spawner;
pub mod supervisor;
pub mod types;

pub use manager::{ExitOutcome, ManagedProcess, WindowOutcome};
pub use restart::{RestartPolicy, RestartWindow, WindowVerdict};
pub use spawner::{spawn_process, SpawnedProcess};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorHandle};
pub use types::{home_directory, LaunchMode, LaunchSpec, LifecycleState};
