//! Change-detected status sync.
//!
//! The snapshot is hashed; an unchanged snapshot is re-sent only once the
//! heartbeat floor has elapsed since the last transmission.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::Worker;
use crate::control::WorkerMessage;
use crate::models::status::StatusSnapshot;

/// Decides whether a snapshot needs to be transmitted.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    heartbeat: Duration,
    last_hash: Option<String>,
    last_sent_at: Option<Instant>,
}

impl StatusReporter {
    /// Create a reporter with the given heartbeat floor.
    #[must_use]
    pub fn new(heartbeat: Duration) -> Self {
        Self {
            heartbeat,
            last_hash: None,
            last_sent_at: None,
        }
    }

    /// Whether a snapshot hashing to `hash` should go out at `now`.
    ///
    /// Records the transmission when it returns `true`.
    pub fn should_send(&mut self, hash: &str, now: Instant) -> bool {
        let due = match (&self.last_hash, self.last_sent_at) {
            (Some(last), Some(at)) => {
                last != hash || now.saturating_duration_since(at) >= self.heartbeat
            }
            _ => true,
        };
        if due {
            self.last_hash = Some(hash.to_owned());
            self.last_sent_at = Some(now);
        }
        due
    }
}

impl Worker {
    /// Build the full status snapshot without side effects.
    #[must_use]
    pub fn build_status(&self) -> StatusSnapshot {
        let services = &self.inner.services;
        let mut identity = services.transport.identity();
        if identity.platform.is_empty() {
            identity.platform = self.session().platform;
        }
        let connected = services.transport.is_connected();
        let limits = services.friend.operation_limits();
        let uptime = self.inner.started_at.elapsed();

        let stats = self
            .inner
            .stats
            .with(|stats| stats.report(connected, &identity, uptime, limits));
        let (automation, preferred_seed) = self
            .inner
            .store
            .read(|snapshot| (snapshot.automation.clone(), snapshot.preferred_seed_id));
        let exp_progress = if identity.level > 0 && identity.exp >= 0 {
            services.data.level_progress(identity.level, identity.exp)
        } else {
            None
        };

        StatusSnapshot {
            stats,
            automation,
            preferred_seed,
            exp_progress,
            config_revision: self.inner.store.applied_revision(),
        }
    }

    /// Send a `status_sync` if the content changed or the heartbeat is due.
    ///
    /// Returns whether a message was sent.
    pub fn sync_status(&self) -> bool {
        let snapshot = self.build_status();
        let hash = match snapshot.content_hash() {
            Ok(hash) => hash,
            Err(err) => {
                debug!(%err, "status snapshot not hashable, skipping");
                return false;
            }
        };

        let due = self
            .inner
            .reporter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .should_send(&hash, Instant::now());
        if due {
            self.inner.outbound.send(WorkerMessage::StatusSync {
                data: Box::new(snapshot),
            });
        }
        due
    }
}
