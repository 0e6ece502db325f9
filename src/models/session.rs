//! Account session model and worker lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a worker process.
///
/// A worker never leaves [`WorkerState::Stopped`]: the process exits and the
/// coordinator spawns a fresh one for the next `start`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Process launched, no `start` received yet.
    Idle,
    /// Applying configuration and subscribing to push events.
    Starting,
    /// Transport connect in progress.
    Connecting,
    /// Connected, waiting for the login reply.
    LoginPending,
    /// Logged in; dependent loops are running.
    Running,
    /// Teardown in progress.
    Stopping,
    /// Terminal.
    Stopped,
}

impl WorkerState {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        matches!(
            (self, next),
            (WorkerState::Idle, WorkerState::Starting | WorkerState::Stopped)
                | (WorkerState::Starting, WorkerState::Connecting)
                | (WorkerState::Connecting, WorkerState::LoginPending)
                | (WorkerState::LoginPending, WorkerState::Running)
                | (
                    WorkerState::Starting
                        | WorkerState::Connecting
                        | WorkerState::LoginPending
                        | WorkerState::Running,
                    WorkerState::Stopping
                )
                | (WorkerState::Stopping, WorkerState::Stopped)
        )
    }

    /// Whether `start` has been accepted and `stop` has not.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(
            self,
            WorkerState::Starting
                | WorkerState::Connecting
                | WorkerState::LoginPending
                | WorkerState::Running
        )
    }
}

/// Last known player identity reported by the transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Player display name.
    pub name: String,
    /// Player level.
    pub level: u32,
    /// Gold balance.
    pub gold: i64,
    /// Total experience.
    pub exp: i64,
    /// Login platform (`qq`, `wx`, ...).
    pub platform: String,
}

/// Mutable per-account session record owned by the worker.
#[derive(Debug, Clone)]
pub struct AccountSession {
    /// Lifecycle state.
    pub state: WorkerState,
    /// Whether a login reply has been received on the current connection.
    pub login_ready: bool,
    /// Identity token used for `connect` and `reconnect`.
    pub code: String,
    /// Login platform.
    pub platform: String,
    /// Whether the post-login loops have already been started.
    pub loops_started: bool,
}

impl AccountSession {
    /// Construct an idle session for `platform`.
    #[must_use]
    pub fn new(platform: String) -> Self {
        Self {
            state: WorkerState::Idle,
            login_ready: false,
            code: String::new(),
            platform,
            loops_started: false,
        }
    }

    /// Move to `next` if the transition is legal; returns whether it moved.
    pub fn transition(&mut self, next: WorkerState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            false
        }
    }
}
