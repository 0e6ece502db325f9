//! `api_call` dispatch.
//!
//! Requests are parsed into a closed [`ApiRequest`] set first, so argument
//! errors and unknown methods are reported the same way as delegate
//! failures: one `api_response` with an error, never a crash.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::Worker;
use crate::analytics::{plant_rankings, SortBy};
use crate::control::WorkerMessage;
use crate::models::snapshot::{ConfigPatch, IntervalsPatch, QuietHours};
use crate::{AppError, Result};

// ── Request types ────────────────────────────────────────────────────────────

/// Which cadence `setIntervals` changes.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntervalKind {
    /// Farm cadence.
    Farm,
    /// Friend cadence.
    Friend,
}

/// A parsed `api_call`.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// Own land details.
    GetLands,
    /// Friend list.
    GetFriends,
    /// One friend's lands.
    GetFriendLands {
        /// Friend id.
        gid: u64,
    },
    /// One operation on a friend's farm.
    DoFriendOp {
        /// Friend id.
        gid: u64,
        /// Operation name.
        op: String,
    },
    /// Plantable seeds.
    GetSeeds,
    /// Flip one automation toggle.
    SetAutomation {
        /// Toggle key.
        key: String,
        /// New value.
        value: bool,
    },
    /// Choose the preferred seed.
    SetSeed {
        /// Seed id; `0` for automatic.
        seed_id: u64,
    },
    /// Re-login, optionally with a new code.
    Reconnect {
        /// New identity token.
        code: Option<String>,
    },
    /// One own-farm operation.
    DoFarmOp {
        /// Operation name.
        op: String,
    },
    /// Crop rankings.
    GetAnalytics {
        /// Ranking key.
        sort_by: SortBy,
    },
    /// Current cadences.
    GetIntervals,
    /// Current planting strategy.
    GetPlantingStrategy,
    /// Change one cadence.
    SetIntervals {
        /// Which cadence.
        kind: IntervalKind,
        /// Seconds.
        value: u64,
    },
    /// Change the planting strategy.
    SetPlantingStrategy {
        /// Strategy name.
        strategy: String,
    },
    /// Replace the friend quiet-hours window.
    SetFriendQuietHours(QuietHours),
    /// Log the bag and sell every fruit.
    DebugSellFruits,
    /// All task lists.
    GetTasks,
    /// Statistics report.
    GetStats,
    /// Zero the statistics.
    ResetStats,
}

// ── Argument decoding ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AutomationArgs {
    key: String,
    value: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedArgs {
    seed_id: u64,
}

#[derive(Default, Deserialize)]
struct ReconnectArgs {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize)]
struct IntervalArgs {
    #[serde(rename = "type")]
    kind: IntervalKind,
    value: u64,
}

#[derive(Deserialize)]
struct StrategyArgs {
    strategy: String,
}

/// Positional argument `index`. A bare non-array value stands for `args[0]`.
fn arg(args: &Value, index: usize) -> &Value {
    match args {
        Value::Array(items) => items.get(index).unwrap_or(&Value::Null),
        other if index == 0 => other,
        _ => &Value::Null,
    }
}

fn required<T: DeserializeOwned>(method: &str, args: &Value, index: usize) -> Result<T> {
    let value = arg(args, index);
    if value.is_null() {
        return Err(AppError::Control(format!(
            "{method}: missing argument {index}"
        )));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::Control(format!("{method}: invalid argument {index}: {e}")))
}

fn optional<T: DeserializeOwned + Default>(method: &str, args: &Value, index: usize) -> Result<T> {
    if arg(args, index).is_null() {
        return Ok(T::default());
    }
    required(method, args, index)
}

// ── Parsing ──────────────────────────────────────────────────────────────────

impl ApiRequest {
    /// Parse `method` and its positional `args`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Control`] with `Unknown method` for names outside
    /// the table, or a description of the bad argument.
    pub fn parse(method: &str, args: &Value) -> Result<Self> {
        let request = match method {
            "getLands" => Self::GetLands,
            "getFriends" => Self::GetFriends,
            "getFriendLands" => Self::GetFriendLands {
                gid: required(method, args, 0)?,
            },
            "doFriendOp" => Self::DoFriendOp {
                gid: required(method, args, 0)?,
                op: required(method, args, 1)?,
            },
            "getSeeds" => Self::GetSeeds,
            "setAutomation" => {
                let AutomationArgs { key, value } = required(method, args, 0)?;
                Self::SetAutomation { key, value }
            }
            "setSeed" => {
                let SeedArgs { seed_id } = required(method, args, 0)?;
                Self::SetSeed { seed_id }
            }
            "reconnect" => {
                let ReconnectArgs { code } = optional(method, args, 0)?;
                Self::Reconnect {
                    code: code.filter(|code| !code.is_empty()),
                }
            }
            "doFarmOp" => Self::DoFarmOp {
                op: required(method, args, 0)?,
            },
            "getAnalytics" => {
                let sort_by: Option<String> = optional(method, args, 0)?;
                Self::GetAnalytics {
                    sort_by: sort_by.as_deref().map_or(Ok(SortBy::default()), str::parse)?,
                }
            }
            "getIntervals" => Self::GetIntervals,
            "getPlantingStrategy" => Self::GetPlantingStrategy,
            "setIntervals" => {
                let IntervalArgs { kind, value } = required(method, args, 0)?;
                Self::SetIntervals { kind, value }
            }
            "setPlantingStrategy" => {
                let StrategyArgs { strategy } = required(method, args, 0)?;
                Self::SetPlantingStrategy { strategy }
            }
            "setFriendQuietHours" => Self::SetFriendQuietHours(optional(method, args, 0)?),
            "debugSellFruits" => Self::DebugSellFruits,
            "getTasks" => Self::GetTasks,
            "getStats" => Self::GetStats,
            "resetStats" => Self::ResetStats,
            _ => return Err(AppError::Control("Unknown method".into())),
        };
        Ok(request)
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────────

impl Worker {
    /// Answer an `api_call` on its own task.
    ///
    /// The handler runs on a nested task so that even a panic inside a
    /// delegate still produces exactly one `api_response` for `id`.
    pub fn spawn_api_call(&self, id: Value, method: String, args: Value) {
        let worker = self.clone();
        let outbound = self.inner.outbound.clone();
        tokio::spawn(async move {
            let handler = tokio::spawn(async move { worker.call_api(&method, &args).await });
            let outcome = match handler.await {
                Ok(outcome) => outcome,
                Err(err) => Err(AppError::Control(format!("handler aborted: {err}"))),
            };
            outbound.send(WorkerMessage::api_response(id, outcome));
        });
    }

    /// Parse and run one API method.
    ///
    /// # Errors
    ///
    /// Returns the parse error or the delegate's error.
    pub async fn call_api(&self, method: &str, args: &Value) -> Result<Value> {
        let outcome = match ApiRequest::parse(method, args) {
            Ok(request) => self.handle_api(request).await,
            Err(err) => Err(err),
        };
        match &outcome {
            Ok(_) => debug!(method, "api call completed"),
            Err(err) => warn!(method, %err, "api call failed"),
        }
        outcome
    }

    /// Run one parsed request.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    pub async fn handle_api(&self, request: ApiRequest) -> Result<Value> {
        let services = &self.inner.services;
        let store = &self.inner.store;
        match request {
            ApiRequest::GetLands => services.farm.lands().await,
            ApiRequest::GetFriends => services.friend.friends().await,
            ApiRequest::GetFriendLands { gid } => services.friend.friend_lands(gid).await,
            ApiRequest::DoFriendOp { gid, op } => services.friend.operate(gid, op).await,
            ApiRequest::GetSeeds => services.farm.seeds().await,
            ApiRequest::SetAutomation { key, value } => {
                self.apply_runtime_config(&ConfigPatch::automation(key, value), true);
                Ok(serde_json::to_value(store.read(|s| s.automation.clone()))?)
            }
            ApiRequest::SetSeed { seed_id } => {
                self.apply_runtime_config(
                    &ConfigPatch {
                        preferred_seed_id: Some(seed_id),
                        ..ConfigPatch::default()
                    },
                    true,
                );
                Ok(json!({ "preferredSeed": store.read(|s| s.preferred_seed_id) }))
            }
            ApiRequest::Reconnect { code } => {
                let code = self.with_session(|session| {
                    if let Some(code) = code {
                        session.code = code;
                    }
                    session.code.clone()
                });
                services.transport.reconnect(code).await?;
                Ok(json!({ "ok": true }))
            }
            ApiRequest::DoFarmOp { op } => services.farm.run_operation(op).await,
            ApiRequest::GetAnalytics { sort_by } => {
                Ok(serde_json::to_value(plant_rankings(&services.data.plants(), sort_by))?)
            }
            ApiRequest::GetIntervals => Ok(serde_json::to_value(store.intervals())?),
            ApiRequest::GetPlantingStrategy => {
                Ok(Value::String(store.read(|s| s.planting_strategy.clone())))
            }
            ApiRequest::SetIntervals { kind, value } => {
                let intervals = match kind {
                    IntervalKind::Farm => IntervalsPatch {
                        farm: Some(value),
                        friend: None,
                    },
                    IntervalKind::Friend => IntervalsPatch {
                        farm: None,
                        friend: Some(value),
                    },
                };
                self.apply_runtime_config(
                    &ConfigPatch {
                        intervals: Some(intervals),
                        ..ConfigPatch::default()
                    },
                    true,
                );
                Ok(serde_json::to_value(store.intervals())?)
            }
            ApiRequest::SetPlantingStrategy { strategy } => {
                self.apply_runtime_config(
                    &ConfigPatch {
                        planting_strategy: Some(strategy),
                        ..ConfigPatch::default()
                    },
                    true,
                );
                Ok(json!({ "plantingStrategy": store.read(|s| s.planting_strategy.clone()) }))
            }
            ApiRequest::SetFriendQuietHours(quiet) => {
                self.apply_runtime_config(
                    &ConfigPatch {
                        friend_quiet_hours: Some(quiet),
                        ..ConfigPatch::default()
                    },
                    true,
                );
                Ok(json!({ "friendQuietHours": store.read(|s| s.friend_quiet_hours.clone()) }))
            }
            ApiRequest::DebugSellFruits => {
                let outcome = self.inner.seller.debug_sell().await?;
                Ok(json!({ "ok": true, "sold": outcome }))
            }
            ApiRequest::GetTasks => Ok(serde_json::to_value(self.inner.claimer.all_tasks().await?)?),
            ApiRequest::GetStats => Ok(serde_json::to_value(self.build_status().stats)?),
            ApiRequest::ResetStats => {
                let identity = services.transport.identity();
                self.inner
                    .stats
                    .with(|stats| stats.reset(identity.gold, identity.exp));
                self.inner.log.info("system", "statistics reset");
                self.sync_status();
                Ok(serde_json::to_value(self.build_status().stats)?)
            }
        }
    }
}
