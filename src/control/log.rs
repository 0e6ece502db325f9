//! Operator-facing log lines.
//!
//! Every line is emitted twice: as a `tracing` event on stderr for local
//! diagnostics, and as a `{type:log}` message for the coordinator's dashboard.

use chrono::Local;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::messages::{LogRecord, WorkerMessage};
use super::ControlSender;

/// Cloneable remote log handle.
#[derive(Debug, Clone)]
pub struct RemoteLog {
    sender: ControlSender,
}

impl RemoteLog {
    /// Create a log handle writing to `sender`.
    #[must_use]
    pub fn new(sender: ControlSender) -> Self {
        Self { sender }
    }

    /// Informational line.
    pub fn info(&self, tag: &str, msg: impl Into<String>) {
        self.emit(tag, msg.into(), false, Value::Null);
    }

    /// Warning line.
    pub fn warn(&self, tag: &str, msg: impl Into<String>) {
        self.emit(tag, msg.into(), true, Value::Null);
    }

    /// Informational line with structured metadata.
    pub fn info_with(&self, tag: &str, msg: impl Into<String>, meta: Value) {
        self.emit(tag, msg.into(), false, meta);
    }

    /// Warning line with structured metadata.
    pub fn warn_with(&self, tag: &str, msg: impl Into<String>, meta: Value) {
        self.emit(tag, msg.into(), true, meta);
    }

    fn emit(&self, tag: &str, msg: String, is_warn: bool, meta: Value) {
        if is_warn {
            warn!(tag, %meta, "{msg}");
        } else {
            info!(tag, %meta, "{msg}");
        }

        let record = LogRecord {
            time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            tag: tag.to_owned(),
            msg,
            is_warn,
            meta: normalize_meta(meta),
        };
        self.sender.send(WorkerMessage::Log { data: record });
    }
}

/// Non-object metadata is replaced by an empty object.
fn normalize_meta(meta: Value) -> Map<String, Value> {
    match meta {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
