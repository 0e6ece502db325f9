//! Unified adaptive scheduler for the farm and friend domains.
//!
//! One fixed-rate tick drives both domains instead of two independent timers,
//! so their checks can never overlap. Each tick:
//!
//! 1. exits if the scheduler is disabled or login is not established;
//! 2. computes which domains are due from the stored next-run instants;
//! 3. tries to take the single [`TaskSlot`]; if the previous tick's work is
//!    still in flight the tick is dropped, not queued;
//! 4. spawns the work and returns immediately.
//!
//! A domain that did something runs again after its nominal interval. A
//! domain that was idle (or gated off, or failed) backs off exponentially:
//! `interval × 2^idle_rounds` with `idle_rounds` clamped to
//! [`MAX_IDLE_ROUNDS`] and the delay capped at [`FARM_BACKOFF_CAP`] /
//! [`FRIEND_BACKOFF_CAP`].

use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Local;
use serde_json::json;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::control::RemoteLog;
use crate::errors::AppError;
use crate::game::{GameFuture, GameServices};
use crate::gate::{AutomationDomain, AutomationGate};
use crate::store::ConfigStore;

// ── Constants ────────────────────────────────────────────────────────────────

/// Upper bound of the idle-round counter.
pub const MAX_IDLE_ROUNDS: u32 = 4;

/// Absolute ceiling of the farm backoff delay.
pub const FARM_BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Absolute ceiling of the friend backoff delay.
pub const FRIEND_BACKOFF_CAP: Duration = Duration::from_secs(120);

/// First farm run after a reset.
pub const FARM_RESET_OFFSET: Duration = Duration::from_secs(2);

/// First friend run after a reset.
pub const FRIEND_RESET_OFFSET: Duration = Duration::from_secs(5);

// ── Schedule state ───────────────────────────────────────────────────────────

/// A domain driven by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledDomain {
    /// Own-farm maintenance.
    Farm,
    /// Friend visits.
    Friend,
}

impl ScheduledDomain {
    /// Toggle consulted before invoking the domain's check.
    #[must_use]
    pub fn gate(self) -> AutomationDomain {
        match self {
            Self::Farm => AutomationDomain::Farm,
            Self::Friend => AutomationDomain::Friend,
        }
    }

    /// Backoff ceiling for the domain.
    #[must_use]
    pub fn backoff_cap(self) -> Duration {
        match self {
            Self::Farm => FARM_BACKOFF_CAP,
            Self::Friend => FRIEND_BACKOFF_CAP,
        }
    }
}

impl Display for ScheduledDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.gate(), f)
    }
}

/// Delay before the next run after `idle_rounds` consecutive idle rounds.
#[must_use]
pub fn backoff_delay(base: Duration, idle_rounds: u32, cap: Duration) -> Duration {
    let factor = 1_u32 << idle_rounds.min(MAX_IDLE_ROUNDS);
    base.saturating_mul(factor).min(cap)
}

/// Per-domain schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainSchedule {
    /// When the domain is next due.
    pub next_run_at: Instant,
    /// Consecutive idle rounds, in `0..=MAX_IDLE_ROUNDS`.
    pub idle_rounds: u32,
}

/// Schedule for both domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    /// Farm schedule.
    pub farm: DomainSchedule,
    /// Friend schedule.
    pub friend: DomainSchedule,
}

impl ScheduleState {
    /// Fresh schedule with staggered first runs.
    #[must_use]
    pub fn reset_at(now: Instant) -> Self {
        Self {
            farm: DomainSchedule {
                next_run_at: now + FARM_RESET_OFFSET,
                idle_rounds: 0,
            },
            friend: DomainSchedule {
                next_run_at: now + FRIEND_RESET_OFFSET,
                idle_rounds: 0,
            },
        }
    }

    /// Schedule of one domain.
    #[must_use]
    pub fn domain(&self, domain: ScheduledDomain) -> &DomainSchedule {
        match domain {
            ScheduledDomain::Farm => &self.farm,
            ScheduledDomain::Friend => &self.friend,
        }
    }

    fn domain_mut(&mut self, domain: ScheduledDomain) -> &mut DomainSchedule {
        match domain {
            ScheduledDomain::Farm => &mut self.farm,
            ScheduledDomain::Friend => &mut self.friend,
        }
    }

    /// Whether `domain` is due at `now`.
    #[must_use]
    pub fn is_due(&self, domain: ScheduledDomain, now: Instant) -> bool {
        now >= self.domain(domain).next_run_at
    }

    /// Score a completed evaluation and schedule the next one.
    ///
    /// Returns the delay until the next run.
    pub fn record(
        &mut self,
        domain: ScheduledDomain,
        worked: bool,
        base: Duration,
        now: Instant,
    ) -> Duration {
        let slot = self.domain_mut(domain);
        slot.idle_rounds = if worked {
            0
        } else {
            (slot.idle_rounds + 1).min(MAX_IDLE_ROUNDS)
        };
        let delay = backoff_delay(base, slot.idle_rounds, domain.backoff_cap());
        slot.next_run_at = now + delay;
        delay
    }
}

// ── Task slot ────────────────────────────────────────────────────────────────

/// Occupancy of a task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// No work in flight.
    Idle,
    /// A tick's work is in flight.
    Running,
}

/// Single-in-flight guard. Acquisition is a compare-and-swap, so the guard
/// holds under a multi-threaded runtime too.
#[derive(Debug, Clone, Default)]
pub struct TaskSlot {
    busy: Arc<AtomicBool>,
}

impl TaskSlot {
    /// Take the slot, or `None` if it is already running.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Current occupancy.
    #[must_use]
    pub fn state(&self) -> SlotState {
        if self.busy.load(Ordering::Acquire) {
            SlotState::Running
        } else {
            SlotState::Idle
        }
    }
}

/// Releases its [`TaskSlot`] on drop, including on panic unwind.
#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ── Scheduler ────────────────────────────────────────────────────────────────

/// The boolean check entry points the scheduler drives.
pub trait DomainChecks: Send + Sync {
    /// Run one pass of `domain`; `true` when a game-affecting action happened.
    ///
    /// # Errors
    ///
    /// Any error is logged by the scheduler and scored as idle.
    fn check(&self, domain: ScheduledDomain) -> GameFuture<'_, bool>;
}

impl DomainChecks for GameServices {
    fn check(&self, domain: ScheduledDomain) -> GameFuture<'_, bool> {
        match domain {
            ScheduledDomain::Farm => self.farm.check(),
            ScheduledDomain::Friend => self.friend.check(),
        }
    }
}

/// What one tick dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Scheduler disabled or login not established.
    Inactive,
    /// Nothing was due.
    NotDue,
    /// Work was due but the slot was busy; the tick was dropped.
    Busy,
    /// Work was started.
    Started,
}

/// Outcome of one domain evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainOutcome {
    /// Whether the collaborator was actually called.
    pub invoked: bool,
    /// Whether it reported a game-affecting action.
    pub worked: bool,
    /// Idle rounds after scoring.
    pub idle_rounds: u32,
    /// Delay until the next run.
    pub delay: Duration,
}

/// Outcome of one executed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Farm evaluation, when farm was due.
    pub farm: Option<DomainOutcome>,
    /// Friend evaluation, when friend was due.
    pub friend: Option<DomainOutcome>,
}

#[derive(Debug, Clone, Copy)]
struct Due {
    farm: bool,
    friend: bool,
}

/// Two-domain adaptive scheduler.
pub struct UnifiedScheduler {
    checks: Arc<dyn DomainChecks>,
    config: ConfigStore,
    log: RemoteLog,
    tick: Duration,
    state: Mutex<ScheduleState>,
    slot: TaskSlot,
    enabled: AtomicBool,
    login_ready: AtomicBool,
    timer: Mutex<Option<CancellationToken>>,
}

impl UnifiedScheduler {
    /// Build a stopped scheduler.
    #[must_use]
    pub fn new(
        checks: Arc<dyn DomainChecks>,
        config: ConfigStore,
        log: RemoteLog,
        tick: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            checks,
            config,
            log,
            tick,
            state: Mutex::new(ScheduleState::reset_at(Instant::now())),
            slot: TaskSlot::default(),
            enabled: AtomicBool::new(false),
            login_ready: AtomicBool::new(false),
            timer: Mutex::new(None),
        })
    }

    /// Enable ticking and re-seed the schedule, without spawning the timer.
    ///
    /// Returns `false` when already enabled. Ticks are then driven through
    /// [`dispatch`](Self::dispatch) or [`run_due`](Self::run_due).
    pub fn enable(&self) -> bool {
        if self.enabled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.reset();
        true
    }

    /// Enable scheduling and spawn the tick timer. No-op when already running.
    pub fn start(self: &Arc<Self>) {
        if !self.enable() {
            return;
        }

        let cancel = CancellationToken::new();
        let previous = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(cancel.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let this = Arc::clone(self);
        tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(this.tick);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => {
                            debug!("unified scheduler timer cancelled");
                            break;
                        }
                        _ = interval.tick() => {
                            this.dispatch();
                        }
                    }
                }
            }
            .instrument(info_span!("unified_scheduler")),
        );
        info!(tick_ms = self.tick.as_millis(), "unified scheduler started");
    }

    /// Disable scheduling and cancel the timer. In-flight work is not awaited.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        if let Some(timer) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.cancel();
        }
    }

    /// Mark whether a login is established.
    pub fn set_login_ready(&self, ready: bool) {
        self.login_ready.store(ready, Ordering::SeqCst);
    }

    /// Re-seed next-run instants to their staggered offsets and clear idle counters.
    pub fn reset(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) =
            ScheduleState::reset_at(Instant::now());
    }

    /// Whether the timer is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Copy of the current schedule.
    #[must_use]
    pub fn schedule(&self) -> ScheduleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Occupancy of the shared task slot.
    #[must_use]
    pub fn slot_state(&self) -> SlotState {
        self.slot.state()
    }

    /// Fire-and-forget tick: starts due work on a spawned task and returns.
    pub fn dispatch(self: &Arc<Self>) -> Dispatch {
        match self.prepare() {
            Ok((due, guard)) => {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    this.execute(due, guard).await;
                });
                Dispatch::Started
            }
            Err(outcome) => outcome,
        }
    }

    /// Run one tick inline, returning what was evaluated.
    ///
    /// Applies the same enable, login, due and slot rules as [`dispatch`](Self::dispatch).
    pub async fn run_due(&self) -> Result<TickReport, Dispatch> {
        let (due, guard) = self.prepare()?;
        Ok(self.execute(due, guard).await)
    }

    fn prepare(&self) -> Result<(Due, SlotGuard), Dispatch> {
        if !self.enabled.load(Ordering::SeqCst) || !self.login_ready.load(Ordering::SeqCst) {
            return Err(Dispatch::Inactive);
        }

        let now = Instant::now();
        let due = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            Due {
                farm: state.is_due(ScheduledDomain::Farm, now),
                friend: state.is_due(ScheduledDomain::Friend, now),
            }
        };
        if !due.farm && !due.friend {
            return Err(Dispatch::NotDue);
        }

        let guard = self.slot.try_acquire().ok_or(Dispatch::Busy)?;
        Ok((due, guard))
    }

    async fn execute(&self, due: Due, _guard: SlotGuard) -> TickReport {
        let mut report = TickReport::default();
        if due.farm {
            report.farm = Some(self.evaluate(ScheduledDomain::Farm).await);
        }
        if due.friend {
            report.friend = Some(self.evaluate(ScheduledDomain::Friend).await);
        }
        report
    }

    async fn evaluate(&self, domain: ScheduledDomain) -> DomainOutcome {
        let intervals = self.config.intervals();
        let base = match domain {
            ScheduledDomain::Farm => intervals.farm_period(),
            ScheduledDomain::Friend => intervals.friend_period(),
        };

        let invoked = self.may_run(domain);
        let worked = if invoked {
            let checks = Arc::clone(&self.checks);
            let joined = tokio::spawn(async move { checks.check(domain).await }).await;
            match joined.unwrap_or_else(|err| Err(AppError::Domain(format!("check aborted: {err}")))) {
                Ok(worked) => worked,
                Err(err) => {
                    self.log.warn_with(
                        "scheduler",
                        format!("{domain} check failed: {err}"),
                        json!({ "module": "scheduler", "event": "tick", "domain": domain.to_string(), "result": "error" }),
                    );
                    false
                }
            }
        } else {
            false
        };

        let (delay, idle_rounds) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let delay = state.record(domain, worked, base, Instant::now());
            (delay, state.domain(domain).idle_rounds)
        };
        debug!(%domain, invoked, worked, idle_rounds, delay_ms = delay.as_millis(), "domain evaluated");

        DomainOutcome {
            invoked,
            worked,
            idle_rounds,
            delay,
        }
    }

    /// Gate check, re-evaluated immediately before every invocation.
    fn may_run(&self, domain: ScheduledDomain) -> bool {
        if !self.config.is_automation_on(domain.gate()) {
            return false;
        }
        if domain == ScheduledDomain::Friend {
            let now = Local::now().time();
            if self
                .config
                .read(|snapshot| snapshot.friend_quiet_hours.contains(now))
            {
                debug!("friend domain inside quiet hours, skipping");
                return false;
            }
        }
        true
    }
}
