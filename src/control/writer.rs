//! Control writer task.
//!
//! Drains outbound [`WorkerMessage`]s and writes each as one NDJSON line to
//! the worker's stdout, flushing after every line so the coordinator sees
//! messages as they happen.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::messages::WorkerMessage;
use crate::{AppError, Result};

/// Serialise a message as a single `\n`-terminated JSON line.
///
/// # Errors
///
/// Returns [`AppError::Protocol`] if serialisation fails.
pub fn encode_message(message: &WorkerMessage) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message)
        .map_err(|e| AppError::Protocol(format!("failed to serialise outbound message: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

async fn write_one<W>(output: &mut W, message: &WorkerMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_message(message)?;
    output.write_all(&bytes).await.map_err(|e| {
        warn!(error = %e, "control writer: write failed");
        AppError::Io(format!("write failed: {e}"))
    })?;
    output.flush().await?;
    Ok(())
}

/// Control writer task.
///
/// Exits when every sender has been dropped, or when `cancel` fires, in which
/// case already-queued messages are still written so a final `api_response`
/// or `account_kicked` is not lost.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the output stream fails.
pub async fn run_writer<W>(
    mut output: W,
    mut msg_rx: mpsc::UnboundedReceiver<WorkerMessage>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            msg = msg_rx.recv() => match msg {
                Some(message) => write_one(&mut output, &message).await?,
                None => {
                    debug!("control writer: all senders dropped, stopping");
                    break;
                }
            },

            () = cancel.cancelled() => {
                while let Ok(message) = msg_rx.try_recv() {
                    write_one(&mut output, &message).await?;
                }
                debug!("control writer: drained after cancellation");
                break;
            }
        }
    }

    Ok(())
}
