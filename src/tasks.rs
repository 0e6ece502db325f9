//! Task reward auto-claim.
//!
//! One check runs shortly after login; afterwards claims are driven by
//! `task_info` pushes. Every batch consults the `task` toggle first.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::control::RemoteLog;
use crate::game::{RewardItem, TaskApi, TaskInfo, TaskRecord};
use crate::gate::{AutomationDomain, AutomationGate};
use crate::models::stats::StatsHandle;
use crate::Result;

/// Pause after each successful claim.
pub const CLAIM_PAUSE: Duration = Duration::from_millis(300);

/// Reward item id for gold.
pub const GOLD_ITEM_ID: u64 = 1;

/// Reward item id for exp.
pub const EXP_ITEM_ID: u64 = 2;

/// Dashboard view of one task.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    /// Task id.
    pub id: u64,
    /// Description, or `task#<id>` when the server sent none.
    pub desc: String,
    /// Current progress.
    pub progress: i64,
    /// Required progress.
    pub total_progress: i64,
    /// Reward already taken.
    pub is_claimed: bool,
    /// Task visible to the player.
    pub is_unlocked: bool,
    /// Share multiplier.
    pub share_multiple: u32,
    /// Reward lines.
    pub rewards: Vec<RewardItem>,
    /// Whether the reward can be claimed now.
    pub can_claim: bool,
}

impl From<&TaskRecord> for TaskView {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            desc: if record.desc.is_empty() {
                format!("task#{}", record.id)
            } else {
                record.desc.clone()
            },
            progress: record.progress,
            total_progress: record.total_progress,
            is_claimed: record.is_claimed,
            is_unlocked: record.is_unlocked,
            share_multiple: record.share_multiple,
            rewards: record.rewards.clone(),
            can_claim: is_claimable(record),
        }
    }
}

impl TaskView {
    /// Whether the claim should request the share multiplier.
    #[must_use]
    pub fn use_share(&self) -> bool {
        self.share_multiple > 1
    }
}

/// Task lists grouped for `getTasks`.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TaskListing {
    /// Daily tasks.
    pub daily: Vec<TaskView>,
    /// Growth tasks.
    pub growth: Vec<TaskView>,
    /// Main-line tasks.
    pub main: Vec<TaskView>,
}

impl From<&TaskInfo> for TaskListing {
    fn from(info: &TaskInfo) -> Self {
        Self {
            daily: info.daily.iter().map(TaskView::from).collect(),
            growth: info.growth.iter().map(TaskView::from).collect(),
            main: info.main.iter().map(TaskView::from).collect(),
        }
    }
}

/// Unlocked, unclaimed, and with completed non-zero progress.
#[must_use]
pub fn is_claimable(record: &TaskRecord) -> bool {
    record.is_unlocked
        && !record.is_claimed
        && record.total_progress > 0
        && record.progress >= record.total_progress
}

/// Claimable tasks in growth, daily, main order.
#[must_use]
pub fn claimable(info: &TaskInfo) -> Vec<TaskView> {
    info.all()
        .filter(|record| is_claimable(record))
        .map(TaskView::from)
        .collect()
}

/// `/`-joined reward summary, or `none` when empty.
#[must_use]
pub fn reward_summary(items: &[RewardItem]) -> String {
    if items.is_empty() {
        return "none".to_owned();
    }
    items
        .iter()
        .map(|item| match item.id {
            GOLD_ITEM_ID => format!("gold {}", item.count),
            EXP_ITEM_ID => format!("exp {}", item.count),
            id => format!("item#{id}x{}", item.count),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Claims completed task rewards.
#[derive(Clone)]
pub struct TaskClaimer {
    api: Arc<dyn TaskApi>,
    gate: Arc<dyn AutomationGate>,
    stats: StatsHandle,
    log: RemoteLog,
}

impl TaskClaimer {
    /// Build a claimer.
    #[must_use]
    pub fn new(
        api: Arc<dyn TaskApi>,
        gate: Arc<dyn AutomationGate>,
        stats: StatsHandle,
        log: RemoteLog,
    ) -> Self {
        Self {
            api,
            gate,
            stats,
            log,
        }
    }

    /// All task lists for the dashboard.
    ///
    /// # Errors
    ///
    /// Propagates task service failures.
    pub async fn all_tasks(&self) -> Result<TaskListing> {
        let info = self.api.task_info().await?;
        Ok(TaskListing::from(&info))
    }

    /// Fetch the task lists and claim everything claimable.
    ///
    /// Returns the number of successful claims. Fetch failures are logged at
    /// debug level and count as zero.
    pub async fn check_and_claim(&self) -> usize {
        if !self.gate.is_automation_on(AutomationDomain::Task) {
            return 0;
        }
        let info = match self.api.task_info().await {
            Ok(info) => info,
            Err(err) => {
                debug!(%err, "task info fetch failed");
                return 0;
            }
        };

        let tasks = claimable(&info);
        if tasks.is_empty() {
            return 0;
        }
        self.log
            .info("task", format!("found {} claimable tasks", tasks.len()));
        self.claim_all(&tasks).await
    }

    /// React to a pushed task update: claim after `delay`.
    pub async fn claim_from_push(&self, info: &TaskInfo, delay: Duration) -> usize {
        let tasks = claimable(info);
        if tasks.is_empty() {
            return 0;
        }
        self.log.info(
            "task",
            format!("{} tasks ready to claim, claiming shortly", tasks.len()),
        );
        tokio::time::sleep(delay).await;

        if !self.gate.is_automation_on(AutomationDomain::Task) {
            return 0;
        }
        self.claim_all(&tasks).await
    }

    /// Claim each task in order. A failed claim does not stop the rest.
    pub async fn claim_all(&self, tasks: &[TaskView]) -> usize {
        let mut claimed = 0;
        for task in tasks {
            if self.claim(task).await {
                claimed += 1;
            }
        }
        claimed
    }

    async fn claim(&self, task: &TaskView) -> bool {
        let shared = task.use_share();
        match self.api.claim_reward(task.id, shared).await {
            Ok(items) => {
                let multiple = if shared {
                    format!(" (x{})", task.share_multiple)
                } else {
                    String::new()
                };
                self.log.info_with(
                    "task",
                    format!("claimed: {}{multiple} -> {}", task.desc, reward_summary(&items)),
                    json!({ "module": "task", "event": "claim", "taskId": task.id }),
                );
                self.stats.record_operation("taskClaim", 1);
                tokio::time::sleep(CLAIM_PAUSE).await;
                true
            }
            Err(err) => {
                self.log
                    .warn("task", format!("claim failed #{}: {err}", task.id));
                false
            }
        }
    }
}
