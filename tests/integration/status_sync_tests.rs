//! Integration tests for change-detected `status_sync` and `stat_update`.

use std::time::Duration;

use farm_autopilot::control::{ControlCommand, WorkerMessage};
use farm_autopilot::game::PushEvent;
use farm_autopilot::models::snapshot::ConfigPatch;

use super::test_helpers::{settle, status_syncs, Harness};

#[tokio::test(start_paused = true)]
async fn unchanged_status_is_held_until_heartbeat() {
    let mut h = Harness::new();
    h.start_logged_in().await;

    tokio::time::sleep(Duration::from_millis(7000)).await;
    assert!(
        status_syncs(&h.drain()).is_empty(),
        "timer ticks at 3s and 6s carry no change"
    );

    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert_eq!(status_syncs(&h.drain()).len(), 1, "heartbeat at 9s");
}

#[tokio::test(start_paused = true)]
async fn resource_push_forwards_stat_update_and_next_tick_syncs() {
    let mut h = Harness::new();
    h.start_logged_in().await;

    h.game.push(PushEvent::Resources {
        gold: 1500,
        exp: 180,
    });
    settle().await;

    let messages = h.drain();
    assert!(messages.iter().any(|m| matches!(
        m,
        WorkerMessage::StatUpdate { data } if data.gold == 1500 && data.exp == 180
    )));
    assert!(status_syncs(&messages).is_empty());

    tokio::time::sleep(Duration::from_millis(3100)).await;
    let syncs = status_syncs(&h.drain());
    assert_eq!(syncs.len(), 1);
    assert_eq!(syncs[0]["sessionGoldGained"], 500);
    assert_eq!(syncs[0]["sessionExpGained"], 30);
}

#[tokio::test(start_paused = true)]
async fn config_sync_sends_status_immediately() {
    let mut h = Harness::new();
    h.start_logged_in().await;

    h.worker.handle_command(ControlCommand::ConfigSync {
        config: ConfigPatch::automation("farm", false),
    });
    settle().await;

    let syncs = status_syncs(&h.drain());
    assert_eq!(syncs.len(), 1);
    assert_eq!(syncs[0]["automation"]["farm"], false);
}
