//! Push-event subscription.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Worker;
use crate::control::messages::GoldExp;
use crate::control::WorkerMessage;
use crate::game::PushEvent;

/// Drain push events until cancelled or the bus closes.
pub async fn run_event_loop(
    worker: Worker,
    mut events: broadcast::Receiver<PushEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("push subscription released");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => worker.on_push(event, &cancel),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "push subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("push bus closed");
                    break;
                }
            },
        }
    }
}

impl Worker {
    /// React to one push event.
    ///
    /// Work that waits (kickout grace, delayed claims) runs on its own task
    /// so the subscription keeps draining.
    pub fn on_push(&self, event: PushEvent, cancel: &CancellationToken) {
        match event {
            PushEvent::LoginSuccess => self.on_login_success(),
            PushEvent::Kickout { reason } => {
                let worker = self.clone();
                tokio::spawn(async move { worker.on_kickout(reason).await });
            }
            PushEvent::Resources { gold, exp } => {
                let delta = self.inner.stats.with(|stats| stats.update(gold, exp));
                debug!(gold, exp, ?delta, "resources updated");
                self.inner.outbound.send(WorkerMessage::StatUpdate {
                    data: GoldExp { gold, exp },
                });
            }
            PushEvent::TaskInfo(info) => {
                if !self.session().loops_started {
                    return;
                }
                let claimer = self.inner.claimer.clone();
                let delay = self.inner.config.timing.task_notify_delay();
                let cancel = cancel.child_token();
                tokio::spawn(async move {
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        _ = claimer.claim_from_push(&info, delay) => {}
                    }
                });
            }
            PushEvent::Notification { name } => {
                debug!(%name, "push notification");
            }
        }
    }
}
