//! Control reader task.
//!
//! Reads newline-delimited JSON commands from the worker's stdin and forwards
//! them to the command loop. Bad lines are answered, never fatal: an
//! `api_call` whose `id` can still be recovered gets an `api_response`
//! error, anything else gets a `{type:error}` message. Lines that are too
//! long or not valid UTF-8 are answered the same way.

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::{ControlCodec, ControlLine, MAX_LINE_BYTES};
use super::messages::{ControlCommand, WorkerMessage};
use super::ControlSender;
use crate::{AppError, Result};

/// Parse one line into a [`ControlCommand`].
///
/// Blank lines yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`AppError::Control`] when the line is not JSON or does not match
/// any command shape.
pub fn parse_command_line(line: &str) -> Result<Option<ControlCommand>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)
        .map_err(|e| AppError::Control(format!("malformed json: {e}")))?;

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| AppError::Control(format!("invalid command: {e}")))
}

/// Recover the correlation id of a rejected `api_call`, if the line has one.
#[must_use]
pub fn recover_request_id(line: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(line).ok()?;
    if value.get("type").and_then(Value::as_str) != Some("api_call") {
        return None;
    }
    value.get("id").filter(|id| !id.is_null()).cloned()
}

/// Answer a rejected line on the control channel.
fn reject_line(outbound: &ControlSender, line: &str, err: AppError) {
    let message = match recover_request_id(line) {
        Some(id) => WorkerMessage::api_response(id, Err(err)),
        None => WorkerMessage::Error {
            error: err.to_string(),
        },
    };
    outbound.send(message);
}

/// Control reader task.
///
/// On EOF the coordinator is gone, so a final [`ControlCommand::Stop`] is
/// forwarded before returning.
///
/// # Errors
///
/// Returns `Ok(())` on EOF, cancellation, or when the command loop has
/// dropped its receiver.
pub async fn run_reader<R>(
    input: R,
    command_tx: mpsc::Sender<ControlCommand>,
    outbound: ControlSender,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(input, ControlCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("control reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        debug!("control reader: EOF, requesting stop");
                        let _ = command_tx.send(ControlCommand::Stop).await;
                        break;
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "control reader: IO error, requesting stop");
                        let _ = command_tx.send(ControlCommand::Stop).await;
                        break;
                    }

                    Some(Ok(ControlLine::TooLong)) => {
                        let err = AppError::Control(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"));
                        warn!(error = %err, "control reader: framing error, skipping");
                        outbound.send(WorkerMessage::Error { error: err.to_string() });
                    }

                    Some(Ok(ControlLine::InvalidUtf8(lossy))) => {
                        warn!(raw_line = %lossy, "control reader: line is not valid utf-8");
                        reject_line(
                            &outbound,
                            &lossy,
                            AppError::Control("invalid utf-8 in command line".into()),
                        );
                    }

                    Some(Ok(ControlLine::Text(line))) => {
                        match parse_command_line(&line) {
                            Ok(Some(command)) => {
                                if command_tx.send(command).await.is_err() {
                                    debug!("control reader: command loop gone, stopping");
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!(error = %e, raw_line = %line, "control reader: rejected line");
                                reject_line(&outbound, &line, e);
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
