//! Dry-run game backend.
//!
//! Logs in immediately with a fixed identity and never changes game state.
//! Lets the worker binary and the coordinator's control-channel plumbing run
//! end to end without a game server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::info;

use super::{
    BagItem, FarmService, FriendService, GameData, GameFuture, GameServices, ItemApi, PlantRecord,
    PushEvent, RewardItem, SellReceipt, TaskApi, TaskInfo, Transport,
};
use crate::models::session::Identity;
use crate::models::status::LevelProgress;
use crate::AppError;

const PUSH_CAPACITY: usize = 64;

/// Backend that performs no game actions.
#[derive(Debug)]
pub struct OfflineGame {
    identity: Identity,
    connected: AtomicBool,
    events: broadcast::Sender<PushEvent>,
}

impl OfflineGame {
    /// Create a backend that reports `identity` once connected.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        let (events, _) = broadcast::channel(PUSH_CAPACITY);
        Self {
            identity,
            connected: AtomicBool::new(false),
            events,
        }
    }

    /// Wrap this backend as a full [`GameServices`] bundle.
    #[must_use]
    pub fn into_services(self) -> GameServices {
        let game = Arc::new(self);
        GameServices {
            transport: Arc::clone(&game) as Arc<dyn Transport>,
            farm: Arc::clone(&game) as Arc<dyn FarmService>,
            friend: Arc::clone(&game) as Arc<dyn FriendService>,
            tasks: Arc::clone(&game) as Arc<dyn TaskApi>,
            items: Arc::clone(&game) as Arc<dyn ItemApi>,
            data: game as Arc<dyn GameData>,
        }
    }

    fn login(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(PushEvent::LoginSuccess);
        let _ = self.events.send(PushEvent::Resources {
            gold: self.identity.gold,
            exp: self.identity.exp,
        });
    }
}

// The offline friend list is always empty.
fn unknown_friend(gid: u64) -> AppError {
    AppError::NotFound(format!("friend {gid}"))
}

impl Transport for OfflineGame {
    fn connect(&self, _code: String) -> GameFuture<'_, ()> {
        Box::pin(async move {
            info!(name = %self.identity.name, "offline backend: login accepted");
            self.login();
            Ok(())
        })
    }

    fn reconnect(&self, _code: String) -> GameFuture<'_, ()> {
        Box::pin(async move {
            self.login();
            Ok(())
        })
    }

    fn cleanup(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn identity(&self) -> Identity {
        self.identity.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.events.subscribe()
    }
}

impl FarmService for OfflineGame {
    fn check(&self) -> GameFuture<'_, bool> {
        Box::pin(async { Ok(false) })
    }

    fn lands(&self) -> GameFuture<'_, Value> {
        Box::pin(async { Ok(json!([])) })
    }

    fn seeds(&self) -> GameFuture<'_, Value> {
        Box::pin(async { Ok(json!([])) })
    }

    fn run_operation(&self, op: String) -> GameFuture<'_, Value> {
        Box::pin(async move { Ok(json!({ "op": op, "count": 0 })) })
    }
}

impl FriendService for OfflineGame {
    fn check(&self) -> GameFuture<'_, bool> {
        Box::pin(async { Ok(false) })
    }

    fn friends(&self) -> GameFuture<'_, Value> {
        Box::pin(async { Ok(json!([])) })
    }

    fn friend_lands(&self, gid: u64) -> GameFuture<'_, Value> {
        Box::pin(async move { Err(unknown_friend(gid)) })
    }

    fn operate(&self, gid: u64, op: String) -> GameFuture<'_, Value> {
        Box::pin(async move {
            info!(gid, op = %op, "offline backend: friend operation refused");
            Err(unknown_friend(gid))
        })
    }

    fn operation_limits(&self) -> Value {
        json!({})
    }
}

impl TaskApi for OfflineGame {
    fn task_info(&self) -> GameFuture<'_, TaskInfo> {
        Box::pin(async { Ok(TaskInfo::default()) })
    }

    fn claim_reward(&self, _id: u64, _shared: bool) -> GameFuture<'_, Vec<RewardItem>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

impl ItemApi for OfflineGame {
    fn bag(&self) -> GameFuture<'_, Vec<BagItem>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn sell(&self, _items: Vec<BagItem>) -> GameFuture<'_, SellReceipt> {
        Box::pin(async { Ok(SellReceipt::default()) })
    }
}

impl GameData for OfflineGame {
    fn level_progress(&self, _level: u32, _exp: i64) -> Option<LevelProgress> {
        None
    }

    fn fruit_name(&self, id: u64) -> String {
        format!("fruit#{id}")
    }

    fn plants(&self) -> Vec<PlantRecord> {
        Vec::new()
    }
}
