use crate::config::apps::{ConfigRow, StartupEntry};
use crate::error::{AppKeeperError, Result};
use crate::ipc::protocol::{LifecycleEvent, ProcessId, ProcessInfo};
use crate::process::events::{EventReceiver, EventSender, SupervisorEvent};
use crate::process::manager::{ExitOutcome, ManagedProcess, WindowOutcome};
use crate::process::restart::RestartPolicy;
use crate::process::types::{LaunchMode, LaunchSpec};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Capacity of the outward lifecycle signal channel
const SIGNAL_CAPACITY: usize = 256;

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Flood protection applied to monitored processes
    pub restart_policy: RestartPolicy,
    /// Bound on the wait for the OS to confirm a launch
    pub start_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_policy: RestartPolicy::default(),
            start_timeout: Duration::from_secs(30),
        }
    }
}

/// Owns every managed process and runs the single event loop
///
/// Launch requests, exit notifications and window timers are all handled
/// one at a time by [`Supervisor::step`], so process state needs no locks.
pub struct Supervisor {
    config: SupervisorConfig,
    processes: HashMap<ProcessId, ManagedProcess>,
    next_id: u64,
    events_tx: EventSender,
    events_rx: EventReceiver,
    signals: broadcast::Sender<LifecycleEvent>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        Self {
            config,
            processes: HashMap::new(),
            next_id: 1,
            events_tx,
            events_rx,
            signals,
        }
    }

    /// Create a supervisor with default configuration
    pub fn with_defaults() -> Self {
        Self::new(SupervisorConfig::default())
    }

    /// Cloneable entry point for collaborators outside the loop
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.events_tx.clone(),
            signals: self.signals.clone(),
        }
    }

    /// Start a new managed process and register it
    ///
    /// The identifier is returned even when the launch fails; in that case
    /// `errored` has been relayed and nothing is kept in the registry.
    pub async fn launch(&mut self, spec: LaunchSpec) -> ProcessId {
        let id = ProcessId::new(self.next_id);
        self.next_id += 1;

        info!(
            "Launching {} as process {} ({})",
            spec.path.display(),
            id,
            spec.mode
        );

        let mut process = ManagedProcess::new(
            id,
            spec,
            self.config.restart_policy,
            self.config.start_timeout,
            self.events_tx.clone(),
        );

        let started = process.start().await;
        self.relay(&mut process);

        if started {
            self.processes.insert(id, process);
        } else {
            debug!("Discarding process {} after failed launch", id);
        }

        id
    }

    pub fn get(&self, id: ProcessId) -> Option<&ManagedProcess> {
        self.processes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn list(&self) -> Vec<ProcessInfo> {
        let mut infos: Vec<ProcessInfo> = self.processes.values().map(|p| p.info()).collect();
        infos.sort_by_key(|info| info.id.as_u64());
        infos
    }

    /// Subscribe to relayed lifecycle signals
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.signals.subscribe()
    }

    /// Run the event loop until shutdown
    pub async fn run(mut self) {
        info!("Supervisor event loop started");
        while self.step().await {}
        info!("Supervisor event loop stopped");
    }

    /// Handle the next queued event
    ///
    /// Returns `false` once a shutdown was processed.
    pub async fn step(&mut self) -> bool {
        // The supervisor holds a sender itself, so the channel never closes
        let Some(event) = self.events_rx.recv().await else {
            return false;
        };
        self.dispatch(event).await
    }

    async fn dispatch(&mut self, event: SupervisorEvent) -> bool {
        match event {
            SupervisorEvent::Launch { spec, reply } => {
                let id = self.launch(spec).await;
                if let Some(reply) = reply {
                    let _ = reply.send(id);
                }
            }

            SupervisorEvent::ChildExited {
                id,
                generation,
                status,
            } => {
                let Some(mut process) = self.processes.remove(&id) else {
                    debug!("Exit notification for unknown process {}", id);
                    return true;
                };

                let outcome = process.on_child_exited(generation, status).await;
                self.relay(&mut process);

                if outcome == ExitOutcome::Finished {
                    debug!("Process {} finished, removing from registry", id);
                } else {
                    self.processes.insert(id, process);
                }
            }

            SupervisorEvent::WindowClosed { id } => {
                let Some(mut process) = self.processes.remove(&id) else {
                    return true;
                };

                let outcome = process.on_window_closed();
                self.relay(&mut process);

                if outcome == WindowOutcome::Suspended {
                    info!("Process {} suspended, removing from registry", id);
                } else {
                    self.processes.insert(id, process);
                }
            }

            SupervisorEvent::Snapshot { reply } => {
                let _ = reply.send(self.list());
            }

            SupervisorEvent::Shutdown { reply } => {
                self.shutdown();
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                return false;
            }
        }

        true
    }

    /// Forward a process's buffered signals to every listener
    fn relay(&self, process: &mut ManagedProcess) {
        for event in process.drain_events() {
            debug!("Relaying {} for process {}", event.kind, event.id);
            // No listeners is not an error
            let _ = self.signals.send(event);
        }
    }

    /// Terminate every live child and empty the registry
    fn shutdown(&mut self) {
        info!("Stopping {} managed process(es)", self.processes.len());

        for (id, mut process) in self.processes.drain() {
            if let Err(e) = process.terminate() {
                error!("Failed to stop process {}: {}", id, e);
            }
        }
    }
}

/// Spec for a launch requested over the control surface; never monitored
pub fn control_request_spec(
    working_directory: Option<PathBuf>,
    path: PathBuf,
    args: Vec<String>,
) -> LaunchSpec {
    LaunchSpec::new(path, args, working_directory, LaunchMode::RunOnce)
}

/// Cloneable access to a running [`Supervisor`]
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: EventSender,
    signals: broadcast::Sender<LifecycleEvent>,
}

impl SupervisorHandle {
    /// Queue a launch and wait for its identifier
    pub async fn launch(&self, spec: LaunchSpec) -> Result<ProcessId> {
        let (reply, rx) = oneshot::channel();
        self.send(SupervisorEvent::Launch {
            spec,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| AppKeeperError::SupervisorUnavailable)
    }

    /// Queue a run-once launch without waiting for it
    pub fn launch_from_control_request(
        &self,
        working_directory: Option<PathBuf>,
        path: PathBuf,
        args: Vec<String>,
    ) -> Result<()> {
        let spec = control_request_spec(working_directory, path, args);
        self.send(SupervisorEvent::Launch { spec, reply: None })
    }

    /// Launch every well-formed row in order
    ///
    /// Each row's settle delay is awaited after its launch completes and
    /// before the next row is submitted. Only this task waits; the
    /// supervisor keeps handling exits and timers meanwhile. Malformed
    /// rows are logged and skipped.
    ///
    /// # Returns
    /// Identifiers of the launches that were submitted
    pub async fn replay_startup_config(&self, rows: &[ConfigRow]) -> Result<Vec<ProcessId>> {
        let mut launched = Vec::new();

        for row in rows {
            let entry = match StartupEntry::try_from(row) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping config row: {}", e);
                    continue;
                }
            };

            launched.push(self.launch(entry.spec).await?);

            if !entry.settle.is_zero() {
                debug!("Settling for {:?} before the next config row", entry.settle);
                tokio::time::sleep(entry.settle).await;
            }
        }

        info!("Startup config replayed: {} launch(es)", launched.len());
        Ok(launched)
    }

    pub async fn list(&self) -> Result<Vec<ProcessInfo>> {
        let (reply, rx) = oneshot::channel();
        self.send(SupervisorEvent::Snapshot { reply })?;
        rx.await.map_err(|_| AppKeeperError::SupervisorUnavailable)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.signals.subscribe()
    }

    /// Ask the loop to stop and wait until children were signalled
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SupervisorEvent::Shutdown { reply: Some(reply) })?;
        rx.await.map_err(|_| AppKeeperError::SupervisorUnavailable)
    }

    fn send(&self, event: SupervisorEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| AppKeeperError::SupervisorUnavailable)
    }
}
