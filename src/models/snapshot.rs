//! Runtime configuration snapshot and partial patches.
//!
//! The coordinator owns persistence; the worker only merges what it is sent.
//! Every field of [`ConfigPatch`] is optional so `config_sync` can carry a
//! single toggle or a full snapshot with the same shape.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Default farm cadence in seconds.
pub const DEFAULT_FARM_INTERVAL_SECS: u64 = 2;

/// Default friend cadence in seconds.
pub const DEFAULT_FRIEND_INTERVAL_SECS: u64 = 10;

/// Automation keys switched on when a snapshot is first created.
const DEFAULT_AUTOMATION_KEYS: &[&str] = &["farm", "friend", "task", "sell"];

/// Per-key automation toggles.
///
/// Keys are open-ended so the coordinator can introduce new toggles without a
/// worker release. A key that was never set counts as enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AutomationFlags(BTreeMap<String, bool>);

impl Default for AutomationFlags {
    fn default() -> Self {
        Self(
            DEFAULT_AUTOMATION_KEYS
                .iter()
                .map(|key| ((*key).to_owned(), true))
                .collect(),
        )
    }
}

impl AutomationFlags {
    /// Whether the toggle named `key` is on.
    #[must_use]
    pub fn is_on(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(true)
    }

    /// Set a single toggle.
    pub fn set(&mut self, key: impl Into<String>, value: bool) {
        self.0.insert(key.into(), value);
    }
}

/// Nominal check cadences, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Intervals {
    /// Farm check cadence.
    pub farm: u64,
    /// Friend check cadence.
    pub friend: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            farm: DEFAULT_FARM_INTERVAL_SECS,
            friend: DEFAULT_FRIEND_INTERVAL_SECS,
        }
    }
}

impl Intervals {
    /// Effective farm period, never below one second.
    #[must_use]
    pub fn farm_period(&self) -> Duration {
        Duration::from_secs(self.farm.max(1))
    }

    /// Effective friend period, never below one second.
    #[must_use]
    pub fn friend_period(&self) -> Duration {
        Duration::from_secs(self.friend.max(1))
    }
}

/// Local-time window during which friend operations are suppressed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    /// Whether the window is active at all.
    #[serde(default)]
    pub enabled: bool,
    /// Window start, `HH:MM`.
    #[serde(default = "default_quiet_start")]
    pub start: String,
    /// Window end, `HH:MM` (exclusive). May wrap past midnight.
    #[serde(default = "default_quiet_end")]
    pub end: String,
}

fn default_quiet_start() -> String {
    "23:00".into()
}

fn default_quiet_end() -> String {
    "07:00".into()
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: default_quiet_start(),
            end: default_quiet_end(),
        }
    }
}

impl QuietHours {
    /// Whether `time` falls inside the window.
    ///
    /// An unparseable bound disables the window rather than silencing the
    /// friend domain forever.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(&self.start, "%H:%M"),
            NaiveTime::parse_from_str(&self.end, "%H:%M"),
        ) else {
            return false;
        };

        if start <= end {
            start <= time && time < end
        } else {
            time >= start || time < end
        }
    }
}

/// Complete runtime configuration as seen by the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    /// Automation toggles per domain.
    #[serde(default)]
    pub automation: AutomationFlags,
    /// Check cadences.
    #[serde(default)]
    pub intervals: Intervals,
    /// Seed to plant when the farm collaborator has a choice; `0` means automatic.
    #[serde(default)]
    pub preferred_seed_id: u64,
    /// Named planting strategy handed through to the farm collaborator.
    #[serde(default = "default_planting_strategy")]
    pub planting_strategy: String,
    /// Friend quiet-hours window.
    #[serde(default)]
    pub friend_quiet_hours: QuietHours,
}

fn default_planting_strategy() -> String {
    "preferred".into()
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            automation: AutomationFlags::default(),
            intervals: Intervals::default(),
            preferred_seed_id: 0,
            planting_strategy: default_planting_strategy(),
            friend_quiet_hours: QuietHours::default(),
        }
    }
}

/// Partial interval update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntervalsPatch {
    /// New farm cadence in seconds.
    #[serde(default)]
    pub farm: Option<u64>,
    /// New friend cadence in seconds.
    #[serde(default)]
    pub friend: Option<u64>,
}

/// Partial or full snapshot carried by `config_sync`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    /// Toggles to overwrite; untouched keys keep their value.
    #[serde(default)]
    pub automation: Option<BTreeMap<String, bool>>,
    /// Cadences to overwrite.
    #[serde(default)]
    pub intervals: Option<IntervalsPatch>,
    /// New preferred seed.
    #[serde(default)]
    pub preferred_seed_id: Option<u64>,
    /// New planting strategy.
    #[serde(default)]
    pub planting_strategy: Option<String>,
    /// New quiet-hours window.
    #[serde(default)]
    pub friend_quiet_hours: Option<QuietHours>,
    /// Coordinator revision tagging this snapshot.
    #[serde(default, rename = "__revision")]
    pub revision: Option<u64>,
}

impl ConfigPatch {
    /// Patch that sets a single automation toggle.
    #[must_use]
    pub fn automation(key: impl Into<String>, value: bool) -> Self {
        Self {
            automation: Some(BTreeMap::from([(key.into(), value)])),
            ..Self::default()
        }
    }
}

/// What a patch actually changed, so the worker can restart dependent loops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChange {
    /// A farm or friend cadence changed.
    pub cadence_changed: bool,
    /// The `sell` toggle flipped.
    pub sell_toggled: bool,
}

impl ConfigSnapshot {
    /// Merge `patch` into this snapshot.
    pub fn apply(&mut self, patch: &ConfigPatch) -> ConfigChange {
        let mut change = ConfigChange::default();

        if let Some(flags) = &patch.automation {
            let sell_before = self.automation.is_on("sell");
            for (key, value) in flags {
                self.automation.set(key.clone(), *value);
            }
            change.sell_toggled = sell_before != self.automation.is_on("sell");
        }

        if let Some(intervals) = &patch.intervals {
            let before = self.intervals;
            if let Some(farm) = intervals.farm {
                self.intervals.farm = farm.max(1);
            }
            if let Some(friend) = intervals.friend {
                self.intervals.friend = friend.max(1);
            }
            change.cadence_changed = before != self.intervals;
        }

        if let Some(seed) = patch.preferred_seed_id {
            self.preferred_seed_id = seed;
        }
        if let Some(strategy) = &patch.planting_strategy {
            self.planting_strategy.clone_from(strategy);
        }
        if let Some(quiet) = &patch.friend_quiet_hours {
            self.friend_quiet_hours = quiet.clone();
        }

        change
    }
}
