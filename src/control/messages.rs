//! Control-channel message types.
//!
//! Inbound commands and outbound messages are internally tagged by `type`,
//! matching the coordinator's JSON shapes exactly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::snapshot::ConfigPatch;
use crate::models::status::StatusSnapshot;

/// Parameters of the `start` command.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartConfig {
    /// Identity token for the game login.
    pub code: String,
    /// Login platform; falls back to the worker config.
    #[serde(default)]
    pub platform: Option<String>,
    /// Initial farm cadence in milliseconds.
    #[serde(default)]
    pub farm_interval: Option<u64>,
    /// Initial friend cadence in milliseconds.
    #[serde(default)]
    pub friend_interval: Option<u64>,
}

/// Command from the coordinator.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Log in and start automation.
    Start {
        /// Login parameters.
        config: StartConfig,
    },
    /// Tear everything down and exit.
    Stop,
    /// Request/response RPC.
    ApiCall {
        /// Correlation id echoed in the `api_response`.
        id: Value,
        /// Method name.
        method: String,
        /// Positional arguments.
        #[serde(default)]
        args: Value,
    },
    /// Apply a partial or full configuration snapshot.
    ConfigSync {
        /// Snapshot fields to merge.
        #[serde(default)]
        config: ConfigPatch,
    },
}

/// Operator-facing log line.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Local wall-clock time.
    pub time: String,
    /// Subsystem tag.
    pub tag: String,
    /// Message text.
    pub msg: String,
    /// Whether this is a warning.
    pub is_warn: bool,
    /// Structured metadata; always an object.
    pub meta: Map<String, Value>,
}

/// Gold/exp observation forwarded with `stat_update`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoldExp {
    /// Gold balance.
    pub gold: i64,
    /// Total experience.
    pub exp: i64,
}

/// Message to the coordinator.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Log line.
    Log {
        /// Record payload.
        data: LogRecord,
    },
    /// Raw identity observation.
    StatUpdate {
        /// Gold and exp.
        data: GoldExp,
    },
    /// Full status snapshot.
    StatusSync {
        /// Snapshot payload.
        data: Box<StatusSnapshot>,
    },
    /// Reply to exactly one `api_call`.
    ApiResponse {
        /// Correlation id from the request.
        id: Value,
        /// Result on success, `null` on failure.
        result: Value,
        /// Error text on failure, `null` on success.
        error: Option<String>,
    },
    /// Failure not attributable to an `api_call`.
    Error {
        /// Error text.
        error: String,
    },
    /// The game server forcibly ended the session.
    AccountKicked {
        /// Reason given by the server.
        reason: String,
    },
}

impl WorkerMessage {
    /// Build an `api_response` from a handler outcome.
    ///
    /// The error text is the bare message, without the category prefix.
    #[must_use]
    pub fn api_response(id: Value, outcome: crate::Result<Value>) -> Self {
        match outcome {
            Ok(result) => Self::ApiResponse {
                id,
                result,
                error: None,
            },
            Err(err) => Self::ApiResponse {
                id,
                result: Value::Null,
                error: Some(err.message().to_owned()),
            },
        }
    }
}
