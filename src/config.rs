//! Worker configuration parsing and validation.
//!
//! The TOML file only carries process-level settings (platform, timing
//! constants, where to find the last persisted runtime snapshot). Runtime
//! toggles and cadences live in [`ConfigSnapshot`](crate::models::snapshot::ConfigSnapshot)
//! and arrive over the control channel.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Timing constants for the worker's loops.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimingConfig {
    /// Resolution of the unified scheduler tick.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Period of the status-sync timer.
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
    /// Maximum silence before an unchanged status is re-sent.
    #[serde(default = "default_status_heartbeat_ms")]
    pub status_heartbeat_ms: u64,
    /// Delay between the kickout notice and the forced stop.
    #[serde(default = "default_short_delay_ms")]
    pub kickout_grace_ms: u64,
    /// Debounce before a cadence change resets the schedule.
    #[serde(default = "default_short_delay_ms")]
    pub config_debounce_ms: u64,
    /// Period of the fruit sell loop.
    #[serde(default = "default_sell_interval_secs")]
    pub sell_interval_secs: u64,
    /// Delay before the first sell run after the loop starts.
    #[serde(default = "default_sell_initial_delay_secs")]
    pub sell_initial_delay_secs: u64,
    /// Delay before the first task sweep after login.
    #[serde(default = "default_task_initial_delay_secs")]
    pub task_initial_delay_secs: u64,
    /// Delay between a task notification and claiming.
    #[serde(default = "default_task_notify_delay_ms")]
    pub task_notify_delay_ms: u64,
}

fn default_tick_ms() -> u64 {
    300
}

fn default_status_interval_ms() -> u64 {
    3000
}

fn default_status_heartbeat_ms() -> u64 {
    8000
}

fn default_short_delay_ms() -> u64 {
    200
}

fn default_sell_interval_secs() -> u64 {
    60
}

fn default_sell_initial_delay_secs() -> u64 {
    10
}

fn default_task_initial_delay_secs() -> u64 {
    4
}

fn default_task_notify_delay_ms() -> u64 {
    1000
}

fn default_platform() -> String {
    "qq".into()
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            status_interval_ms: default_status_interval_ms(),
            status_heartbeat_ms: default_status_heartbeat_ms(),
            kickout_grace_ms: default_short_delay_ms(),
            config_debounce_ms: default_short_delay_ms(),
            sell_interval_secs: default_sell_interval_secs(),
            sell_initial_delay_secs: default_sell_initial_delay_secs(),
            task_initial_delay_secs: default_task_initial_delay_secs(),
            task_notify_delay_ms: default_task_notify_delay_ms(),
        }
    }
}

impl TimingConfig {
    /// Scheduler tick period.
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Status-sync timer period.
    #[must_use]
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    /// Status heartbeat floor.
    #[must_use]
    pub fn status_heartbeat(&self) -> Duration {
        Duration::from_millis(self.status_heartbeat_ms)
    }

    /// Kickout grace delay.
    #[must_use]
    pub fn kickout_grace(&self) -> Duration {
        Duration::from_millis(self.kickout_grace_ms)
    }

    /// Cadence-change debounce.
    #[must_use]
    pub fn config_debounce(&self) -> Duration {
        Duration::from_millis(self.config_debounce_ms)
    }

    /// Sell loop period.
    #[must_use]
    pub fn sell_interval(&self) -> Duration {
        Duration::from_secs(self.sell_interval_secs)
    }

    /// Delay before the first sell run.
    #[must_use]
    pub fn sell_initial_delay(&self) -> Duration {
        Duration::from_secs(self.sell_initial_delay_secs)
    }

    /// Delay before the first task sweep.
    #[must_use]
    pub fn task_initial_delay(&self) -> Duration {
        Duration::from_secs(self.task_initial_delay_secs)
    }

    /// Delay between a task notification and claiming.
    #[must_use]
    pub fn task_notify_delay(&self) -> Duration {
        Duration::from_millis(self.task_notify_delay_ms)
    }
}

/// Process-level worker configuration parsed from `worker.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Default login platform when `start` does not name one.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// JSON file holding the last persisted runtime snapshot.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// Loop timing constants.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            snapshot_path: None,
            timing: TimingConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let timing = &self.timing;
        let positive = [
            ("tick_ms", timing.tick_ms),
            ("status_interval_ms", timing.status_interval_ms),
            ("status_heartbeat_ms", timing.status_heartbeat_ms),
            ("sell_interval_secs", timing.sell_interval_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "timing.{name} must be greater than zero"
                )));
            }
        }

        if self.platform.trim().is_empty() {
            return Err(AppError::Config("platform must not be empty".into()));
        }

        Ok(())
    }
}
