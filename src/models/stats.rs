//! Session statistics: gold/exp gain tracking and operation counters.
//!
//! Gains are accumulated from consecutive identity observations rather than
//! from a login-time snapshot, so a reconnect or a late first push never
//! inflates the totals.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::session::Identity;

/// Baseline value meaning "no observation yet".
pub const UNSET: i64 = -1;

/// Window inside which a repeated identical exp delta counts as a retransmission.
pub const DUPLICATE_EXP_WINDOW: Duration = Duration::from_millis(1000);

/// Operation kinds tracked by [`SessionStats::record_operation`].
pub const OPERATION_KINDS: &[&str] = &[
    "harvest",
    "water",
    "weed",
    "bug",
    "fertilize",
    "plant",
    "steal",
    "helpWater",
    "helpWeed",
    "helpBug",
    "taskClaim",
    "sell",
    "upgrade",
];

/// How an exp observation was scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpOutcome {
    /// Exp did not increase, or this was the baseline observation.
    Unchanged,
    /// A new gain was counted.
    Gained(i64),
    /// The delta repeated the previous accepted gain within the window.
    Duplicate(i64),
}

/// Result of a single [`SessionStats::update_at`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsDelta {
    /// Positive gold delta counted, if any.
    pub gold_gained: Option<i64>,
    /// Exp scoring.
    pub exp: ExpOutcome,
}

/// Pure statistics report shared by `getStats` and `status_sync`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    /// Connection state.
    pub connection: ConnectionReport,
    /// Last known identity.
    pub status: Identity,
    /// Seconds since the worker started.
    pub uptime: f64,
    /// Operation counters.
    pub operations: BTreeMap<String, u64>,
    /// Exp gained this session.
    pub session_exp_gained: i64,
    /// Gold gained this session.
    pub session_gold_gained: i64,
    /// Most recent accepted exp delta.
    pub last_exp_gain: i64,
    /// Most recent accepted gold delta.
    pub last_gold_gain: i64,
    /// Daily operation limits reported by the friend collaborator.
    pub limits: serde_json::Value,
}

/// Connection portion of [`StatsReport`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ConnectionReport {
    /// Whether the transport currently holds an open session.
    pub connected: bool,
}

/// Per-process gain and operation accounting.
#[derive(Debug, Clone)]
pub struct SessionStats {
    operations: BTreeMap<String, u64>,
    last_gold: i64,
    last_exp: i64,
    session_gold_gained: i64,
    session_exp_gained: i64,
    last_gold_gain: i64,
    last_exp_gain: i64,
    last_exp_gain_at: Option<Instant>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    /// Fresh statistics with unset baselines.
    #[must_use]
    pub fn new() -> Self {
        Self {
            operations: OPERATION_KINDS
                .iter()
                .map(|kind| ((*kind).to_owned(), 0))
                .collect(),
            last_gold: UNSET,
            last_exp: UNSET,
            session_gold_gained: 0,
            session_exp_gained: 0,
            last_gold_gain: 0,
            last_exp_gain: 0,
            last_exp_gain_at: None,
        }
    }

    /// Score a new identity observation at the current instant.
    pub fn update(&mut self, gold: i64, exp: i64) -> StatsDelta {
        self.update_at(gold, exp, Instant::now())
    }

    /// Score a new identity observation made at `now`.
    ///
    /// Gold decreases rebase silently. Exp is upward-only, and a delta equal to
    /// the previous accepted delta arriving within [`DUPLICATE_EXP_WINDOW`] of
    /// that acceptance is dropped.
    pub fn update_at(&mut self, gold: i64, exp: i64, now: Instant) -> StatsDelta {
        if self.last_gold == UNSET {
            self.last_gold = gold;
        }
        if self.last_exp == UNSET {
            self.last_exp = exp;
        }

        let mut gold_gained = None;
        if gold > self.last_gold {
            let delta = gold - self.last_gold;
            self.session_gold_gained += delta;
            self.last_gold_gain = delta;
            gold_gained = Some(delta);
        }
        self.last_gold = gold;

        let mut outcome = ExpOutcome::Unchanged;
        if exp > self.last_exp {
            let delta = exp - self.last_exp;
            let repeated = delta == self.last_exp_gain
                && self
                    .last_exp_gain_at
                    .is_some_and(|at| now.saturating_duration_since(at) < DUPLICATE_EXP_WINDOW);
            if repeated {
                outcome = ExpOutcome::Duplicate(delta);
            } else {
                self.session_exp_gained += delta;
                self.last_exp_gain = delta;
                self.last_exp_gain_at = Some(now);
                outcome = ExpOutcome::Gained(delta);
            }
        }
        self.last_exp = exp;

        StatsDelta {
            gold_gained,
            exp: outcome,
        }
    }

    /// Increment the counter for `kind`. Unknown kinds are ignored.
    pub fn record_operation(&mut self, kind: &str, count: u64) {
        if let Some(counter) = self.operations.get_mut(kind) {
            *counter += count;
        }
    }

    /// Current counter value for `kind` (zero when unknown).
    #[must_use]
    pub fn operation_count(&self, kind: &str) -> u64 {
        self.operations.get(kind).copied().unwrap_or(0)
    }

    /// Zero counters and session gains, and rebase on the given identity.
    pub fn reset(&mut self, gold: i64, exp: i64) {
        for counter in self.operations.values_mut() {
            *counter = 0;
        }
        self.last_gold = gold;
        self.last_exp = exp;
        self.session_gold_gained = 0;
        self.session_exp_gained = 0;
        self.last_gold_gain = 0;
        self.last_exp_gain = 0;
        self.last_exp_gain_at = None;
    }

    /// Gold gained since start or last reset.
    #[must_use]
    pub fn session_gold_gained(&self) -> i64 {
        self.session_gold_gained
    }

    /// Exp gained since start or last reset.
    #[must_use]
    pub fn session_exp_gained(&self) -> i64 {
        self.session_exp_gained
    }

    /// Current gold baseline.
    #[must_use]
    pub fn last_gold(&self) -> i64 {
        self.last_gold
    }

    /// Current exp baseline.
    #[must_use]
    pub fn last_exp(&self) -> i64 {
        self.last_exp
    }

    /// Most recent accepted gold delta.
    #[must_use]
    pub fn last_gold_gain(&self) -> i64 {
        self.last_gold_gain
    }

    /// Most recent accepted exp delta.
    #[must_use]
    pub fn last_exp_gain(&self) -> i64 {
        self.last_exp_gain
    }

    /// Build a report without touching any state.
    #[must_use]
    pub fn report(
        &self,
        connected: bool,
        identity: &Identity,
        uptime: Duration,
        limits: serde_json::Value,
    ) -> StatsReport {
        StatsReport {
            connection: ConnectionReport { connected },
            status: identity.clone(),
            uptime: uptime.as_secs_f64(),
            operations: self.operations.clone(),
            session_exp_gained: self.session_exp_gained,
            session_gold_gained: self.session_gold_gained,
            last_exp_gain: self.last_exp_gain,
            last_gold_gain: self.last_gold_gain,
            limits,
        }
    }
}

/// Cloneable shared handle to a worker's [`SessionStats`].
#[derive(Debug, Clone, Default)]
pub struct StatsHandle(Arc<Mutex<SessionStats>>);

impl StatsHandle {
    /// Run `f` with exclusive access to the statistics.
    pub fn with<R>(&self, f: impl FnOnce(&mut SessionStats) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Increment the counter for `kind`.
    pub fn record_operation(&self, kind: &str, count: u64) {
        self.with(|stats| stats.record_operation(kind, count));
    }
}
