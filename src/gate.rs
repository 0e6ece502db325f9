//! Automation on/off gate.
//!
//! Consulted immediately before every collaborator call that changes game
//! state. Implementations must re-read the configuration on every call; a
//! toggle switched off must suppress the very next attempt.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::models::snapshot::ConfigSnapshot;
use crate::store::ConfigStore;

/// Automation domain guarded by a toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AutomationDomain {
    /// Own-farm maintenance.
    Farm,
    /// Friend visits and helping.
    Friend,
    /// Task reward claiming.
    Task,
    /// Fruit selling.
    Sell,
}

impl AutomationDomain {
    /// Toggle key in [`AutomationFlags`](crate::models::snapshot::AutomationFlags).
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Farm => "farm",
            Self::Friend => "friend",
            Self::Task => "task",
            Self::Sell => "sell",
        }
    }
}

impl Display for AutomationDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Pure predicate over a snapshot.
#[must_use]
pub fn is_automation_on(snapshot: &ConfigSnapshot, domain: AutomationDomain) -> bool {
    snapshot.automation.is_on(domain.key())
}

/// Live automation gate.
pub trait AutomationGate: Send + Sync {
    /// Whether `domain` may act right now.
    fn is_automation_on(&self, domain: AutomationDomain) -> bool;
}

impl AutomationGate for ConfigStore {
    fn is_automation_on(&self, domain: AutomationDomain) -> bool {
        self.read(|snapshot| is_automation_on(snapshot, domain))
    }
}
