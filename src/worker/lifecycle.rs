//! Worker lifecycle: start, login, stop, kickout and live reconfiguration.
//!
//! ```text
//! Idle -> Starting -> Connecting -> LoginPending -> Running
//!            \            \              \             \
//!             +------------+--------------+-------------+--> Stopping -> Stopped
//! ```
//!
//! `Stopped` is terminal: the exit token fires and the process ends.

use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::run_event_loop;
use super::handles::LoopHandle;
use super::Worker;
use crate::control::messages::StartConfig;
use crate::control::WorkerMessage;
use crate::gate::{AutomationDomain, AutomationGate};
use crate::models::session::WorkerState;
use crate::models::snapshot::{ConfigPatch, IntervalsPatch};
use crate::warehouse::run_sell_loop;
use crate::{AppError, Result};

/// Convert a millisecond cadence to whole seconds, rounding up, at least one.
#[must_use]
pub fn millis_to_interval_secs(ms: u64) -> u64 {
    ms.div_ceil(1000).max(1)
}

/// Read a persisted runtime snapshot.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read and `AppError::Config`
/// if it is not a valid snapshot.
pub fn load_snapshot(path: &Path) -> Result<ConfigPatch> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::Config(format!("invalid snapshot {}: {e}", path.display()))
    })
}

impl Worker {
    /// Accept `start`. A no-op unless the worker is idle.
    ///
    /// Subscribes to push events before connecting so the login reply is
    /// never missed. Dependent loops start on the first login success.
    pub fn start(&self, start: StartConfig) {
        let started = self.with_session(|session| {
            if !session.transition(WorkerState::Starting) {
                return false;
            }
            session.code.clone_from(&start.code);
            if let Some(platform) = start.platform.as_ref().filter(|p| !p.is_empty()) {
                session.platform.clone_from(platform);
            }
            true
        });
        if !started {
            debug!(state = ?self.state(), "start ignored, worker already started");
            return;
        }

        let initial = ConfigPatch {
            intervals: Some(IntervalsPatch {
                farm: start.farm_interval.map(millis_to_interval_secs),
                friend: start.friend_interval.map(millis_to_interval_secs),
            }),
            ..ConfigPatch::default()
        };
        self.apply_runtime_config(&initial, false);
        self.apply_persisted_snapshot();

        let platform = self.session().platform;
        info!(%platform, "worker starting");
        self.inner.log.info_with(
            "system",
            "connecting to server",
            json!({ "module": "lifecycle", "event": "start", "platform": platform }),
        );

        let events = self.inner.services.transport.subscribe();
        let worker = self.clone();
        self.loops().events = Some(LoopHandle::spawn("events", move |cancel| {
            run_event_loop(worker, events, cancel)
        }));

        self.with_session(|session| session.transition(WorkerState::Connecting));
        let worker = self.clone();
        let code = start.code;
        tokio::spawn(async move {
            match worker.inner.services.transport.connect(code).await {
                Ok(()) => {
                    worker.with_session(|session| {
                        if session.state == WorkerState::Connecting {
                            session.transition(WorkerState::LoginPending);
                        }
                    });
                }
                Err(err) => {
                    warn!(%err, "connect failed");
                    worker.inner.outbound.send(WorkerMessage::Error {
                        error: format!("connect failed: {}", err.message()),
                    });
                    worker.stop();
                }
            }
        });
    }

    fn apply_persisted_snapshot(&self) {
        let Some(path) = self.inner.config.snapshot_path.as_deref() else {
            return;
        };
        match load_snapshot(path) {
            Ok(mut patch) => {
                // The coordinator tracks revisions; a file on disk carries none.
                patch.revision = None;
                self.apply_runtime_config(&patch, false);
                debug!(path = %path.display(), "applied persisted snapshot");
            }
            Err(err) => {
                self.inner
                    .log
                    .warn("system", format!("persisted config ignored: {err}"));
            }
        }
    }

    /// Handle a login success push.
    ///
    /// The first login starts every dependent loop exactly once; later logins
    /// after a transport reconnect only reset the schedule.
    pub fn on_login_success(&self) {
        let first = self.with_session(|session| {
            if !session.state.is_running() {
                return None;
            }
            if session.state == WorkerState::Connecting {
                session.transition(WorkerState::LoginPending);
            }
            if session.state == WorkerState::LoginPending {
                session.transition(WorkerState::Running);
            }
            session.login_ready = true;
            let first = !session.loops_started;
            session.loops_started = true;
            Some(first)
        });
        let Some(first) = first else {
            debug!("login success ignored, worker not running");
            return;
        };

        let scheduler = &self.inner.scheduler;
        scheduler.set_login_ready(true);
        if first {
            scheduler.start();
            self.start_task_check();
            self.restart_sell_loop();
            self.start_status_timer();
            self.inner.log.info_with(
                "system",
                "login success, automation started",
                json!({ "module": "lifecycle", "event": "login", "first": true }),
            );
        } else {
            scheduler.reset();
            self.inner.log.info("system", "logged in again, schedule reset");
        }
        self.sync_status();
    }

    fn start_task_check(&self) {
        let claimer = self.inner.claimer.clone();
        let delay = self.inner.config.timing.task_initial_delay();
        self.loops().tasks = Some(LoopHandle::spawn("tasks", move |cancel| async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    claimer.check_and_claim().await;
                }
            }
        }));
    }

    fn start_status_timer(&self) {
        let worker = self.clone();
        let period = self.inner.config.timing.status_interval();
        self.loops().status = Some(LoopHandle::spawn("status", move |cancel| async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        worker.sync_status();
                    }
                }
            }
        }));
    }

    /// Drop the sell loop and start a fresh one when `sell` is on.
    fn restart_sell_loop(&self) {
        let mut loops = self.loops();
        loops.sell = None;
        if !self.inner.store.is_automation_on(AutomationDomain::Sell) {
            debug!("sell automation off, sell loop not started");
            return;
        }
        let seller = self.inner.seller.clone();
        let timing = &self.inner.config.timing;
        let (initial, period) = (timing.sell_initial_delay(), timing.sell_interval());
        loops.sell = Some(LoopHandle::spawn("sell", move |cancel| {
            run_sell_loop(seller, initial, period, cancel)
        }));
    }

    /// Stop the worker. Idempotent; an idle worker stops immediately.
    ///
    /// Loops are cancelled without awaiting in-flight remote calls.
    pub fn stop(&self) {
        let was_active = self.with_session(|session| match session.state {
            WorkerState::Stopping | WorkerState::Stopped => None,
            WorkerState::Idle => {
                session.transition(WorkerState::Stopped);
                Some(false)
            }
            _ => {
                session.transition(WorkerState::Stopping);
                session.login_ready = false;
                Some(true)
            }
        });
        let Some(was_active) = was_active else {
            return;
        };

        if was_active {
            self.inner.scheduler.set_login_ready(false);
            self.inner.scheduler.stop();
            self.loops().clear();
            self.inner.services.transport.cleanup();
            self.with_session(|session| session.transition(WorkerState::Stopped));
            info!("worker stopped");
        } else {
            debug!("stop received before start, exiting");
        }
        self.inner.exit.cancel();
    }

    /// Forced server-side disconnect: notify, wait the grace delay, stop.
    ///
    /// Only the first kickout is acted on.
    pub async fn on_kickout(&self, reason: String) {
        if self.inner.kicked.swap(true, Ordering::SeqCst) {
            return;
        }
        let reason = if reason.is_empty() {
            "unknown".to_owned()
        } else {
            reason
        };
        self.inner.log.info_with(
            "system",
            format!("kicked offline, account will be removed. reason: {reason}"),
            json!({ "module": "lifecycle", "event": "kickout" }),
        );
        self.inner
            .outbound
            .send(WorkerMessage::AccountKicked { reason });
        tokio::time::sleep(self.inner.config.timing.kickout_grace()).await;
        self.stop();
    }

    /// Merge a configuration patch without persisting it.
    ///
    /// Once logged in, a cadence change resets the schedule after the
    /// debounce delay (a newer change replaces a pending reset) and a `sell`
    /// toggle flip restarts or stops the sell loop.
    pub fn apply_runtime_config(&self, patch: &ConfigPatch, sync_now: bool) {
        let change = self.inner.store.apply(patch);
        let logged_in = self.with_session(|session| session.login_ready && session.loops_started);

        if logged_in {
            if change.cadence_changed {
                let intervals = self.inner.store.intervals();
                debug!(
                    farm = intervals.farm,
                    friend = intervals.friend,
                    "cadence changed, scheduling reset"
                );
                let scheduler = Arc::clone(&self.inner.scheduler);
                let debounce = self.inner.config.timing.config_debounce();
                self.loops().reset_debounce =
                    Some(LoopHandle::spawn("reset_debounce", move |cancel: CancellationToken| async move {
                        tokio::select! {
                            () = cancel.cancelled() => {}
                            () = tokio::time::sleep(debounce) => scheduler.reset(),
                        }
                    }));
            }
            if change.sell_toggled {
                self.restart_sell_loop();
            }
        }

        if sync_now {
            self.sync_status();
        }
    }
}
