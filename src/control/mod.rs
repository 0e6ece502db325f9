//! Coordinator control channel.
//!
//! The coordinator talks to each worker over the worker's stdio using
//! newline-delimited JSON: commands arrive on stdin, messages leave on
//! stdout. Diagnostics go to stderr so they never corrupt the stream.
//!
//! - `codec`: line framing with a size cap.
//! - `messages`: typed inbound commands and outbound messages.
//! - `reader`: decodes stdin into [`ControlCommand`]s.
//! - `writer`: serialises [`WorkerMessage`]s onto stdout.
//! - `log`: operator-facing log lines mirrored into `tracing`.

pub mod codec;
pub mod log;
pub mod messages;
pub mod reader;
pub mod writer;

use tokio::sync::mpsc;
use tracing::debug;

pub use log::RemoteLog;
pub use messages::{ControlCommand, WorkerMessage};

/// Cloneable handle for emitting messages to the coordinator.
///
/// Sending never blocks: log lines are produced from synchronous code and
/// `api_response`s must never be dropped for lack of capacity.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

impl ControlSender {
    /// Create a sender and the receiver the writer task drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `message`; returns `false` once the writer has gone away.
    pub fn send(&self, message: WorkerMessage) -> bool {
        if self.tx.send(message).is_err() {
            debug!("control channel closed, dropping outbound message");
            return false;
        }
        true
    }
}
