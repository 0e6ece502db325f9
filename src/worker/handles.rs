//! Disposable handles for the worker's background loops.
//!
//! Dropping a handle cancels its task, so clearing a [`LoopSet`] releases
//! every subscription and timer without tracking them individually.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

/// Handle to one spawned loop.
pub struct LoopHandle {
    name: &'static str,
    cancel: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl Drop for LoopHandle {
    /// Cancel the background loop when the handle is dropped.
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            debug!(name = self.name, "cancelling worker loop");
        }
        self.cancel.cancel();
    }
}

impl LoopHandle {
    /// Spawn `body` with a fresh cancellation token.
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let join_handle = tokio::spawn(body(cancel.clone()).instrument(info_span!("worker_loop", name)));
        Self {
            name,
            cancel,
            join_handle,
        }
    }

    /// Loop name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the loop task has not yet exited.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.join_handle.is_finished()
    }
}

/// Every loop a running worker owns.
#[derive(Default)]
pub struct LoopSet {
    /// Push-event subscription.
    pub events: Option<LoopHandle>,
    /// Fixed-rate status sync timer.
    pub status: Option<LoopHandle>,
    /// Initial task check.
    pub tasks: Option<LoopHandle>,
    /// Periodic fruit selling.
    pub sell: Option<LoopHandle>,
    /// Pending debounced scheduler reset.
    pub reset_debounce: Option<LoopHandle>,
}

impl LoopSet {
    /// Names of the loops that are still running.
    #[must_use]
    pub fn active(&self) -> Vec<&'static str> {
        [
            &self.events,
            &self.status,
            &self.tasks,
            &self.sell,
            &self.reset_debounce,
        ]
        .into_iter()
        .flatten()
        .filter(|handle| handle.is_active())
        .map(LoopHandle::name)
        .collect()
    }

    /// Drop every handle, cancelling its loop.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
