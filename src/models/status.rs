//! Status snapshot pushed to the coordinator by `status_sync`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::snapshot::AutomationFlags;
use super::stats::StatsReport;
use crate::Result;

/// Progress inside the current level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    /// Exp accumulated inside the current level.
    pub current: i64,
    /// Exp required to reach the next level.
    pub needed: i64,
}

/// Full status snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Connection, identity, uptime, counters and gains.
    #[serde(flatten)]
    pub stats: StatsReport,
    /// Automation toggles currently in effect.
    pub automation: AutomationFlags,
    /// Preferred seed currently in effect.
    pub preferred_seed: u64,
    /// Level progress, when the level table knows the current level.
    pub exp_progress: Option<LevelProgress>,
    /// Highest configuration revision applied so far.
    pub config_revision: u64,
}

impl StatusSnapshot {
    /// SHA-256 over the snapshot content, excluding `uptime`.
    ///
    /// Uptime moves on every tick; hashing it would defeat change detection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Protocol` if the snapshot cannot be serialised.
    pub fn content_hash(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove("uptime");
        }
        let bytes = serde_json::to_vec(&value)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}
