//! Game collaborator contracts.
//!
//! The worker never speaks the game protocol itself. Everything it needs from
//! the game server is reached through these traits: the transport (session,
//! identity, push bus) and one narrow service per domain. Concrete decision
//! logic for farming and friend visits lives behind [`FarmService`] and
//! [`FriendService`]; the worker only schedules them.

pub mod offline;
pub mod types;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::models::session::Identity;
use crate::models::status::LevelProgress;
use crate::Result;

pub use types::{BagItem, PlantRecord, PushEvent, RewardItem, SellReceipt, TaskInfo, TaskRecord};

/// Boxed future returned by collaborator methods.
pub type GameFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Session transport to the game server.
///
/// Reconnection after a dropped socket is the transport's own business; a
/// successful re-login is announced with [`PushEvent::LoginSuccess`].
pub trait Transport: Send + Sync {
    /// Open a session with `code`. Resolves once the socket is open; the
    /// login outcome arrives on the push bus.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// session cannot be opened.
    fn connect(&self, code: String) -> GameFuture<'_, ()>;

    /// Drop the current session and log in again with `code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) on failure.
    fn reconnect(&self, code: String) -> GameFuture<'_, ()>;

    /// Close the session and release resources. Idempotent.
    fn cleanup(&self);

    /// Whether the session socket is currently open.
    fn is_connected(&self) -> bool;

    /// Last identity state reported by the server.
    fn identity(&self) -> Identity;

    /// Subscribe to push events.
    fn subscribe(&self) -> broadcast::Receiver<PushEvent>;
}

/// Own-farm collaborator.
pub trait FarmService: Send + Sync {
    /// Run one maintenance pass; `true` when at least one action was taken.
    ///
    /// # Errors
    ///
    /// Propagates transport, protocol and domain failures.
    fn check(&self) -> GameFuture<'_, bool>;

    /// Land details for the dashboard.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn lands(&self) -> GameFuture<'_, Value>;

    /// Seeds available to plant.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn seeds(&self) -> GameFuture<'_, Value>;

    /// Run a single named operation (`harvest`, `water`, ...).
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn run_operation(&self, op: String) -> GameFuture<'_, Value>;
}

/// Friend collaborator.
pub trait FriendService: Send + Sync {
    /// Run one friend pass; `true` when at least one action was taken.
    ///
    /// # Errors
    ///
    /// Propagates transport, protocol and domain failures.
    fn check(&self) -> GameFuture<'_, bool>;

    /// Friend list.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn friends(&self) -> GameFuture<'_, Value>;

    /// Land details of one friend.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn friend_lands(&self, gid: u64) -> GameFuture<'_, Value>;

    /// Run a single named operation on one friend's farm.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn operate(&self, gid: u64, op: String) -> GameFuture<'_, Value>;

    /// Daily operation limits as last reported.
    fn operation_limits(&self) -> Value;
}

/// Task service RPCs.
pub trait TaskApi: Send + Sync {
    /// Fetch all task lists.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn task_info(&self) -> GameFuture<'_, TaskInfo>;

    /// Claim the reward of task `id`, optionally with the share multiplier.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn claim_reward(&self, id: u64, shared: bool) -> GameFuture<'_, Vec<RewardItem>>;
}

/// Item service RPCs.
pub trait ItemApi: Send + Sync {
    /// Current bag contents.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn bag(&self) -> GameFuture<'_, Vec<BagItem>>;

    /// Sell one batch of items.
    ///
    /// # Errors
    ///
    /// Propagates collaborator failures.
    fn sell(&self, items: Vec<BagItem>) -> GameFuture<'_, SellReceipt>;
}

/// Static game tables.
pub trait GameData: Send + Sync {
    /// Progress inside `level` given total `exp`, if the level is known.
    fn level_progress(&self, level: u32, exp: i64) -> Option<LevelProgress>;

    /// Display name of a fruit item.
    fn fruit_name(&self, id: u64) -> String;

    /// All plant definitions.
    fn plants(&self) -> Vec<PlantRecord>;
}

/// Bundle of collaborators handed to a worker.
#[derive(Clone)]
pub struct GameServices {
    /// Session transport.
    pub transport: Arc<dyn Transport>,
    /// Own-farm service.
    pub farm: Arc<dyn FarmService>,
    /// Friend service.
    pub friend: Arc<dyn FriendService>,
    /// Task RPCs.
    pub tasks: Arc<dyn TaskApi>,
    /// Item RPCs.
    pub items: Arc<dyn ItemApi>,
    /// Static tables.
    pub data: Arc<dyn GameData>,
}
