//! Per-account worker runtime.
//!
//! A [`Worker`] owns everything one account process needs: the session
//! record, the configuration store, statistics, the unified scheduler, and
//! the handles of every background loop. All state is per instance, so
//! several workers can live in one test process.
//!
//! - `lifecycle`: `start`, login handling, `stop`, kickout, `config_sync`.
//! - `api`: the `api_call` method table.
//! - `status`: change-detected `status_sync`.
//! - `events`: push-event subscription.
//! - `handles`: cancel-on-drop loop handles.

pub mod api;
pub mod events;
pub mod handles;
pub mod lifecycle;
pub mod status;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::control::{ControlCommand, ControlSender, RemoteLog};
use crate::game::GameServices;
use crate::gate::AutomationGate;
use crate::models::session::{AccountSession, WorkerState};
use crate::models::stats::StatsHandle;
use crate::scheduler::{DomainChecks, UnifiedScheduler};
use crate::store::ConfigStore;
use crate::tasks::TaskClaimer;
use crate::warehouse::FruitSeller;

pub use api::ApiRequest;
pub use handles::{LoopHandle, LoopSet};
pub use status::StatusReporter;

struct WorkerInner {
    config: WorkerConfig,
    services: GameServices,
    outbound: ControlSender,
    log: RemoteLog,
    store: ConfigStore,
    stats: StatsHandle,
    session: Mutex<AccountSession>,
    scheduler: Arc<UnifiedScheduler>,
    claimer: TaskClaimer,
    seller: FruitSeller,
    reporter: Mutex<StatusReporter>,
    loops: Mutex<LoopSet>,
    kicked: AtomicBool,
    exit: CancellationToken,
    started_at: Instant,
}

/// Cloneable handle to one account's automation runtime.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    /// Build an idle worker around `services`, emitting on `outbound`.
    #[must_use]
    pub fn new(config: WorkerConfig, services: GameServices, outbound: ControlSender) -> Self {
        let log = RemoteLog::new(outbound.clone());
        let store = ConfigStore::default();
        let stats = StatsHandle::default();
        let gate: Arc<dyn AutomationGate> = Arc::new(store.clone());

        let scheduler = UnifiedScheduler::new(
            Arc::new(services.clone()) as Arc<dyn DomainChecks>,
            store.clone(),
            log.clone(),
            config.timing.tick(),
        );
        let claimer = TaskClaimer::new(
            Arc::clone(&services.tasks),
            Arc::clone(&gate),
            stats.clone(),
            log.clone(),
        );
        let seller = FruitSeller::new(
            Arc::clone(&services.items),
            Arc::clone(&services.transport),
            Arc::clone(&services.data),
            gate,
            stats.clone(),
            log.clone(),
        );
        let reporter = StatusReporter::new(config.timing.status_heartbeat());
        let session = AccountSession::new(config.platform.clone());

        Self {
            inner: Arc::new(WorkerInner {
                config,
                services,
                outbound,
                log,
                store,
                stats,
                session: Mutex::new(session),
                scheduler,
                claimer,
                seller,
                reporter: Mutex::new(reporter),
                loops: Mutex::new(LoopSet::default()),
                kicked: AtomicBool::new(false),
                exit: CancellationToken::new(),
                started_at: Instant::now(),
            }),
        }
    }

    /// Command loop. Returns once the worker has stopped.
    ///
    /// A closed command channel is treated as `stop`.
    pub async fn run(&self, mut commands: mpsc::Receiver<ControlCommand>) {
        loop {
            tokio::select! {
                () = self.inner.exit.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("command channel closed, stopping");
                        self.stop();
                        break;
                    }
                },
            }
        }
    }

    /// Dispatch one control command.
    pub fn handle_command(&self, command: ControlCommand) {
        match command {
            ControlCommand::Start { config } => self.start(config),
            ControlCommand::Stop => self.stop(),
            ControlCommand::ApiCall { id, method, args } => self.spawn_api_call(id, method, args),
            ControlCommand::ConfigSync { config } => self.apply_runtime_config(&config, true),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.session().state
    }

    /// Copy of the session record.
    #[must_use]
    pub fn session(&self) -> AccountSession {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runtime configuration store.
    #[must_use]
    pub fn config_store(&self) -> &ConfigStore {
        &self.inner.store
    }

    /// Shared statistics.
    #[must_use]
    pub fn stats(&self) -> &StatsHandle {
        &self.inner.stats
    }

    /// The unified scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<UnifiedScheduler> {
        &self.inner.scheduler
    }

    /// Names of the background loops currently running.
    #[must_use]
    pub fn active_loops(&self) -> Vec<&'static str> {
        self.loops().active()
    }

    /// Token cancelled once the worker has stopped and the process may exit.
    #[must_use]
    pub fn exit_token(&self) -> CancellationToken {
        self.inner.exit.clone()
    }

    fn loops(&self) -> std::sync::MutexGuard<'_, LoopSet> {
        self.inner
            .loops
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut AccountSession) -> R) -> R {
        let mut guard = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
