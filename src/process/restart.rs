use std::time::Duration;

/// Default length of the restart observation window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Default number of restarts tolerated inside one window
pub const DEFAULT_MAX_RESTARTS: usize = 5;

/// Flood-protection settings for monitored processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Length of one observation window
    pub window: Duration,
    /// Restarts allowed per window; one more suspends the process
    pub max_restarts: usize,
}

impl RestartPolicy {
    pub fn new(window: Duration, max_restarts: usize) -> Self {
        Self {
            window,
            max_restarts,
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_RESTARTS)
    }
}

/// Outcome of closing an observation window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    /// Restarts stayed within the limit
    Healthy { restarts: usize },
    /// Restarts exceeded the limit; automatic restarting must stop
    CrashLooping { restarts: usize },
}

/// Counts restarts inside the current observation window
///
/// The window opens on the first restart after a quiet period and is
/// closed by whoever owns the timer. Opening is reported to the caller
/// exactly once per window so only one timer is ever armed.
#[derive(Debug, Clone)]
pub struct RestartWindow {
    policy: RestartPolicy,
    restart_count: usize,
    active: bool,
}

impl RestartWindow {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            restart_count: 0,
            active: false,
        }
    }

    /// Record one restart attempt
    ///
    /// Returns `true` when this attempt opened a new window and the
    /// caller must arm the window timer.
    pub fn record_restart(&mut self) -> bool {
        let opened = !self.active;
        self.active = true;
        self.restart_count += 1;
        opened
    }

    /// Whether the current window has already seen too many restarts
    pub fn exceeded(&self) -> bool {
        self.active && self.restart_count > self.policy.max_restarts
    }

    /// Close the window and judge it; the count always resets
    pub fn close(&mut self) -> WindowVerdict {
        let restarts = self.restart_count;
        self.restart_count = 0;
        self.active = false;

        if restarts > self.policy.max_restarts {
            WindowVerdict::CrashLooping { restarts }
        } else {
            WindowVerdict::Healthy { restarts }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Restarts seen in the current window (0 when no window is open)
    pub fn restart_count(&self) -> usize {
        self.restart_count
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }
}
