//! Integration tests for fruit selling: batching, skipped slots, partial
//! failures, gold observation and the periodic sell loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use farm_autopilot::control::{ControlSender, RemoteLog, WorkerMessage};
use farm_autopilot::game::BagItem;
use farm_autopilot::gate::AutomationGate;
use farm_autopilot::models::snapshot::ConfigPatch;
use farm_autopilot::models::stats::StatsHandle;
use farm_autopilot::store::ConfigStore;
use farm_autopilot::warehouse::FruitSeller;

use super::test_helpers::{fruits, logs, FakeGame, Harness, GOLD_PER_FRUIT};

struct SellFixture {
    game: Arc<FakeGame>,
    store: ConfigStore,
    stats: StatsHandle,
    seller: FruitSeller,
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl SellFixture {
    fn new(bag: Vec<BagItem>) -> Self {
        let game = FakeGame::new();
        *game.bag.lock().unwrap() = bag;
        let services = game.services();
        let store = ConfigStore::default();
        let stats = StatsHandle::default();
        let (outbound, rx) = ControlSender::channel();
        let seller = FruitSeller::new(
            services.items,
            services.transport,
            services.data,
            Arc::new(store.clone()) as Arc<dyn AutomationGate>,
            stats.clone(),
            RemoteLog::new(outbound),
        );
        Self {
            game,
            store,
            stats,
            seller,
            rx,
        }
    }

    fn lines(&mut self) -> Vec<(String, String, bool)> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        logs(&messages)
    }
}

fn mixed_bag() -> Vec<BagItem> {
    let mut bag = fruits(20);
    bag.push(BagItem {
        id: 3500,
        count: 2,
        uid: 0,
    });
    bag.push(BagItem {
        id: 1,
        count: 5,
        uid: 9,
    });
    bag
}

#[tokio::test(start_paused = true)]
async fn sells_in_batches_of_fifteen_and_observes_gold() {
    let mut fx = SellFixture::new(mixed_bag());

    let outcome = fx.seller.sell_all().await.expect("sell enabled");

    assert_eq!(fx.game.sold_batches(), vec![15, 5]);
    assert_eq!(outcome.items, 20);
    assert_eq!(outcome.batches, 2);
    assert_eq!(outcome.failed_batches, 0);
    assert_eq!(outcome.gold, 20 * GOLD_PER_FRUIT);
    assert_eq!(fx.stats.with(|stats| stats.operation_count("sell")), 20);

    let lines = fx.lines();
    assert!(lines.iter().any(|(_, msg, is_warn)| {
        *is_warn && msg == "skipping invalid item: id=3500 count=2 (uid missing)"
    }));
    assert!(lines
        .iter()
        .any(|(tag, msg, _)| tag == "warehouse" && msg.ends_with("got 200 gold")));
}

#[tokio::test(start_paused = true)]
async fn failed_batch_is_counted_and_rest_continue() {
    let mut fx = SellFixture::new(fruits(20));
    fx.game.failing_batches.lock().unwrap().push(0);

    let outcome = fx.seller.sell_all().await.expect("sell enabled");

    assert_eq!(fx.game.sold_batches(), vec![5]);
    assert_eq!(outcome.items, 5);
    assert_eq!(outcome.failed_batches, 1);
    assert!(outcome.is_partial());
    assert_eq!(outcome.gold, 5 * GOLD_PER_FRUIT);
    assert_eq!(fx.stats.with(|stats| stats.operation_count("sell")), 5);
    assert!(fx
        .lines()
        .iter()
        .any(|(_, msg, is_warn)| *is_warn && msg == "1 of 2 batches failed"));
}

#[tokio::test(start_paused = true)]
async fn unobserved_gold_is_reported_as_pending() {
    let mut fx = SellFixture::new(fruits(3));
    fx.game.failing_batches.lock().unwrap().push(0);

    let outcome = fx.seller.sell_all().await.expect("sell enabled");

    assert_eq!(outcome.gold, 0);
    assert!(!outcome.is_partial());
    assert!(fx.lines().iter().any(|(_, msg, is_warn)| {
        *is_warn && msg == "gold change not received yet, status will update later"
    }));
}

#[tokio::test(start_paused = true)]
async fn empty_bag_sells_nothing() {
    let mut fx = SellFixture::new(Vec::new());

    let outcome = fx.seller.sell_all().await.expect("sell enabled");

    assert_eq!(outcome.batches, 0);
    assert!(fx.game.sold_batches().is_empty());
    assert!(fx.lines().iter().any(|(_, msg, _)| msg == "no fruit to sell"));
}

#[tokio::test(start_paused = true)]
async fn sell_toggle_off_skips_run() {
    let fx = SellFixture::new(fruits(3));
    fx.store.apply(&ConfigPatch::automation("sell", false));

    assert!(fx.seller.sell_all().await.is_none());
    assert!(fx.game.sold_batches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn debug_sell_ignores_toggle_and_sums_receipts() {
    let mut fx = SellFixture::new(mixed_bag());
    fx.store.apply(&ConfigPatch::automation("sell", false));

    let outcome = fx.seller.debug_sell().await.unwrap();

    assert_eq!(outcome.items, 20);
    assert_eq!(outcome.gold, 20 * GOLD_PER_FRUIT);
    let lines = fx.lines();
    assert!(lines.iter().any(|(_, msg, _)| msg == "bag holds 22 kinds of items"));
    assert!(lines
        .iter()
        .any(|(_, msg, _)| msg == "  [item] non-fruit(1) x5 uid=9"));
    assert!(lines.iter().any(|(_, msg, _)| msg == "  batch 2: got 50 gold"));
}

#[tokio::test(start_paused = true)]
async fn debug_sell_api_returns_outcome() {
    let mut h = Harness::new();
    *h.game.bag.lock().unwrap() = fruits(4);

    let (result, error) = h
        .call(1, "debugSellFruits", serde_json::json!([]), Duration::from_millis(50))
        .await;

    assert_eq!(error, None);
    assert_eq!(result["ok"], true);
    assert_eq!(result["sold"]["items"], 4);
    assert_eq!(result["sold"]["failedBatches"], 0);
    assert_eq!(result["sold"]["gold"], 4 * GOLD_PER_FRUIT);
}

#[tokio::test(start_paused = true)]
async fn sell_loop_runs_after_initial_delay() {
    let mut h = Harness::new();
    *h.game.bag.lock().unwrap() = fruits(3);
    h.start_logged_in().await;

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(h.game.sold_batches().is_empty());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.game.sold_batches(), vec![3]);
    assert!(logs(&h.drain())
        .iter()
        .any(|(_, msg, _)| msg == "auto-sell started, every 60s"));
}
