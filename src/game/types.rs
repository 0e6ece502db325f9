//! Typed payloads exchanged with game collaborators.

use serde::{Deserialize, Serialize};

/// Unsolicited event delivered by the transport's push bus.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A login reply was accepted on the current connection.
    LoginSuccess,
    /// The server forcibly ended the session.
    Kickout {
        /// Reason given by the server; may be empty.
        reason: String,
    },
    /// Gold or exp changed.
    Resources {
        /// New gold balance.
        gold: i64,
        /// New total exp.
        exp: i64,
    },
    /// Task progress changed.
    TaskInfo(TaskInfo),
    /// Any other named domain notification.
    Notification {
        /// Event name.
        name: String,
    },
}

/// One reward line of a task or claim reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardItem {
    /// Item id; `1` is gold and `2` is exp.
    pub id: u64,
    /// Quantity.
    pub count: i64,
}

/// Raw task record as reported by the task service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Task id.
    pub id: u64,
    /// Human-readable description; may be empty.
    #[serde(default)]
    pub desc: String,
    /// Current progress.
    pub progress: i64,
    /// Progress required to complete.
    pub total_progress: i64,
    /// Reward already taken.
    pub is_claimed: bool,
    /// Task visible to the player.
    pub is_unlocked: bool,
    /// Reward multiplier available when claiming with sharing.
    #[serde(default)]
    pub share_multiple: u32,
    /// Reward lines.
    #[serde(default)]
    pub rewards: Vec<RewardItem>,
}

/// Task lists grouped the way the task service reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Growth tasks.
    #[serde(default)]
    pub growth: Vec<TaskRecord>,
    /// Daily tasks.
    #[serde(default)]
    pub daily: Vec<TaskRecord>,
    /// Main-line tasks.
    #[serde(default)]
    pub main: Vec<TaskRecord>,
}

impl TaskInfo {
    /// All tasks, growth first, then daily, then main.
    pub fn all(&self) -> impl Iterator<Item = &TaskRecord> {
        self.growth.iter().chain(&self.daily).chain(&self.main)
    }
}

/// One bag slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BagItem {
    /// Item id.
    pub id: u64,
    /// Quantity held.
    pub count: i64,
    /// Unique slot id; `0` when the server omitted it.
    #[serde(default)]
    pub uid: u64,
}

/// Reply to a sell request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SellReceipt {
    /// Gold credited for the batch.
    pub gold: i64,
}

/// Static plant definition from the game data tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlantRecord {
    /// Plant id.
    pub id: u64,
    /// Seed id used to plant it.
    pub seed_id: u64,
    /// Display name.
    pub name: String,
    /// `name:seconds;` phase list.
    pub grow_phases: String,
    /// Exp per harvest.
    pub exp: i64,
    /// Fruits per harvest.
    pub output: i64,
    /// Sell price per fruit.
    pub price: i64,
    /// Land level required; `0` when unrestricted.
    #[serde(default)]
    pub land_level_need: u32,
}
