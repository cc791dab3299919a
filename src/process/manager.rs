use crate::error::{AppKeeperError, Result};
use crate::ipc::protocol::{LifecycleEvent, LifecycleKind, ProcessId, ProcessInfo};
use crate::process::events::{describe_exit, EventSender, SupervisorEvent};
use crate::process::restart::{RestartPolicy, RestartWindow, WindowVerdict};
use crate::process::spawner::spawn_process;
use crate::process::types::{LaunchSpec, LifecycleState};
use std::path::Path;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio::task::JoinHandle;

/// A live child and the task waiting for it to exit
#[derive(Debug)]
struct OsHandle {
    pid: u32,
    waiter: JoinHandle<()>,
}

/// What the supervisor should do after an exit notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Notification belonged to an older child or a suspended process
    Ignored,
    /// A fresh child was launched (or a failed launch was requeued)
    Restarted,
    /// Too many restarts in the open window; waiting for it to close
    Held,
    /// The process is done and can be discarded
    Finished,
}

/// What the supervisor should do after a window closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    Healthy,
    Suspended,
}

/// Supervises one program: its OS handle, lifecycle and restart window
///
/// All methods run on the supervisor loop. Exit notifications and window
/// timers arrive as [`SupervisorEvent`]s on `notify`; lifecycle signals
/// are buffered and collected with [`ManagedProcess::drain_events`].
#[derive(Debug)]
pub struct ManagedProcess {
    id: ProcessId,
    spec: LaunchSpec,
    state: LifecycleState,
    handle: Option<OsHandle>,
    window: RestartWindow,
    window_timer: Option<JoinHandle<()>>,
    /// Bumped on every successful launch; stale exit notifications carry an older value
    generation: u64,
    start_timeout: Duration,
    notify: EventSender,
    outbox: Vec<LifecycleEvent>,
}

impl ManagedProcess {
    pub fn new(
        id: ProcessId,
        spec: LaunchSpec,
        policy: RestartPolicy,
        start_timeout: Duration,
        notify: EventSender,
    ) -> Self {
        Self {
            id,
            spec,
            state: LifecycleState::Idle,
            handle: None,
            window: RestartWindow::new(policy),
            window_timer: None,
            generation: 0,
            start_timeout,
            notify,
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(|h| h.pid)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn restart_count(&self) -> usize {
        self.window.restart_count()
    }

    /// Whether a window timer is armed
    pub fn window_pending(&self) -> bool {
        self.window_timer.is_some()
    }

    /// Takes effect on the next `start()`
    pub fn set_working_directory<P: AsRef<Path>>(&mut self, dir: P) {
        self.spec.set_working_directory(dir);
    }

    /// Lifecycle signals produced since the last call, oldest first
    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Launch the program and wait for the OS to confirm it is executing
    ///
    /// Emits `started` and returns `true` on success. On failure emits
    /// `errored`, leaves the process in `Exited` without a handle and
    /// returns `false`.
    pub async fn start(&mut self) -> bool {
        self.release_handle();
        self.state = LifecycleState::Starting;

        tracing::debug!(
            "Launching {} (id: {}) in {}",
            self.spec.path.display(),
            self.id,
            self.spec.working_directory.display()
        );

        match spawn_process(&self.spec, self.start_timeout).await {
            Ok(spawned) => {
                self.generation += 1;
                self.state = LifecycleState::Running;
                tracing::info!(
                    "Started {} (id: {}, PID: {})",
                    self.spec.path.display(),
                    self.id,
                    spawned.pid
                );
                // Queue `started` before the waiter exists so it always precedes `exited`
                self.emit(LifecycleKind::Started);

                let waiter = self.watch_exit(spawned.child);
                self.handle = Some(OsHandle {
                    pid: spawned.pid,
                    waiter,
                });
                true
            }
            Err(e) => {
                tracing::warn!("{}", e);
                self.state = LifecycleState::Exited;
                self.emit(LifecycleKind::Errored);
                false
            }
        }
    }

    /// React to the OS reporting that the child terminated
    pub async fn on_child_exited(
        &mut self,
        generation: u64,
        status: Option<ExitStatus>,
    ) -> ExitOutcome {
        if generation != self.generation || self.state == LifecycleState::Suspended {
            tracing::debug!(
                "Ignoring stale exit notification for process {} (generation {})",
                self.id,
                generation
            );
            return ExitOutcome::Ignored;
        }

        self.release_handle();
        tracing::info!(
            "Process {} ({}) ended: {}",
            self.id,
            self.spec.path.display(),
            describe_exit(status.as_ref())
        );

        if !self.spec.mode.restarts_on_exit() {
            self.state = LifecycleState::Exited;
            self.emit(LifecycleKind::Exited);
            return ExitOutcome::Finished;
        }

        if self.window.exceeded() {
            self.state = LifecycleState::Exited;
            tracing::warn!(
                "Process {} restarted {} times in the current window, holding further restarts",
                self.id,
                self.window.restart_count()
            );
            return ExitOutcome::Held;
        }

        if self.window.record_restart() {
            self.arm_window_timer();
        }

        tracing::info!(
            "Restarting process {} (restart {} in window)",
            self.id,
            self.window.restart_count()
        );

        if !self.start().await {
            // A failed relaunch counts as another exit
            let _ = self.notify.send(SupervisorEvent::ChildExited {
                id: self.id,
                generation: self.generation,
                status: None,
            });
        }

        ExitOutcome::Restarted
    }

    /// Judge the restart window that just elapsed
    pub fn on_window_closed(&mut self) -> WindowOutcome {
        self.window_timer = None;

        match self.window.close() {
            WindowVerdict::Healthy { restarts } => {
                tracing::debug!(
                    "Restart window for process {} closed after {} restart(s)",
                    self.id,
                    restarts
                );
                WindowOutcome::Healthy
            }
            WindowVerdict::CrashLooping { restarts } => {
                let err = AppKeeperError::CrashLoopSuspended(self.spec.path.display().to_string());
                tracing::warn!(
                    "{} (id: {}, {} restarts within {:?})",
                    err,
                    self.id,
                    restarts,
                    self.window.policy().window
                );
                self.stop_child();
                self.state = LifecycleState::Suspended;
                self.emit(LifecycleKind::Exited);
                WindowOutcome::Suspended
            }
        }
    }

    /// Send SIGTERM to the live child, if any, and stop watching it
    pub fn terminate(&mut self) -> Result<()> {
        if let Some(timer) = self.window_timer.take() {
            timer.abort();
        }

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.waiter.abort();
        self.generation += 1;
        self.state = LifecycleState::Exited;

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            tracing::info!(
                "Terminating process {} (PID: {}) with SIGTERM",
                self.id,
                handle.pid
            );
            kill(Pid::from_raw(handle.pid as i32), Signal::SIGTERM).map_err(|e| {
                AppKeeperError::SignalError(format!(
                    "Failed to send SIGTERM to {}: {}",
                    handle.pid, e
                ))
            })?;
        }

        Ok(())
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            id: self.id,
            path: self.spec.path.clone(),
            args: self.spec.args.clone(),
            working_directory: self.spec.working_directory.clone(),
            mode: self.spec.mode,
            state: self.state,
            pid: self.pid(),
            restarts: self.window.restart_count(),
        }
    }

    fn emit(&mut self, kind: LifecycleKind) {
        self.outbox.push(LifecycleEvent {
            id: self.id,
            kind,
            path: self.spec.path.clone(),
        });
    }

    fn watch_exit(&self, mut child: Child) -> JoinHandle<()> {
        let notify = self.notify.clone();
        let id = self.id;
        let generation = self.generation;

        tokio::spawn(async move {
            let status = child.wait().await.ok();
            let _ = notify.send(SupervisorEvent::ChildExited {
                id,
                generation,
                status,
            });
        })
    }

    /// Arm the one-shot window timer; no-op while one is pending
    fn arm_window_timer(&mut self) {
        if self.window_timer.is_some() {
            return;
        }

        let notify = self.notify.clone();
        let id = self.id;
        let window = self.window.policy().window;

        self.window_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = notify.send(SupervisorEvent::WindowClosed { id });
        }));
    }

    /// Drop the handle of a child that already exited
    fn release_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.waiter.abort();
        }
    }

    /// Stop listening for exits and SIGTERM a child that is still running
    fn stop_child(&mut self) {
        if let Err(e) = self.terminate() {
            tracing::warn!("{}", e);
        }
        self.generation += 1;
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if let Some(timer) = self.window_timer.take() {
            timer.abort();
        }
        self.release_handle();
    }
}
