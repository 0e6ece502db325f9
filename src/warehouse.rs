//! Fruit liquidation.
//!
//! Fruits are sold in fixed-size batches. A failed batch does not abort the
//! run; the outcome reports how many batches went through.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::control::RemoteLog;
use crate::game::{BagItem, GameData, ItemApi, Transport};
use crate::gate::{AutomationDomain, AutomationGate};
use crate::models::stats::StatsHandle;
use crate::Result;

/// Lowest fruit item id.
pub const FRUIT_ID_MIN: u64 = 3001;

/// Highest fruit item id.
pub const FRUIT_ID_MAX: u64 = 49_999;

/// Items per sell request.
pub const SELL_BATCH_SIZE: usize = 15;

/// Pause between sell requests.
pub const BATCH_PAUSE: Duration = Duration::from_millis(300);

/// How long to wait for the gold push after selling.
pub const GOLD_WAIT: Duration = Duration::from_secs(2);

/// Gold polling step.
pub const GOLD_POLL_STEP: Duration = Duration::from_millis(200);

/// Whether `id` is a fruit.
#[must_use]
pub fn is_fruit(id: u64) -> bool {
    (FRUIT_ID_MIN..=FRUIT_ID_MAX).contains(&id)
}

/// Bag partitioned for selling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FruitSelection {
    /// Sellable fruit slots.
    pub sellable: Vec<BagItem>,
    /// Fruit slots skipped because the server omitted their uid.
    pub missing_uid: Vec<BagItem>,
}

/// Pick fruits with a positive count out of `bag`.
#[must_use]
pub fn select_fruits(bag: &[BagItem]) -> FruitSelection {
    let mut selection = FruitSelection::default();
    for item in bag.iter().filter(|item| is_fruit(item.id) && item.count > 0) {
        if item.uid == 0 {
            selection.missing_uid.push(*item);
        } else {
            selection.sellable.push(*item);
        }
    }
    selection
}

/// Result of one sell run.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SellOutcome {
    /// Fruit slots submitted.
    pub items: usize,
    /// Batches attempted.
    pub batches: usize,
    /// Batches the server rejected.
    pub failed_batches: usize,
    /// Gold credited, observed or summed from replies.
    pub gold: i64,
}

impl SellOutcome {
    /// Whether some but not all batches failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.failed_batches > 0 && self.failed_batches < self.batches
    }
}

/// Sells fruits from the bag.
#[derive(Clone)]
pub struct FruitSeller {
    items: Arc<dyn ItemApi>,
    transport: Arc<dyn Transport>,
    data: Arc<dyn GameData>,
    gate: Arc<dyn AutomationGate>,
    stats: StatsHandle,
    log: RemoteLog,
}

impl FruitSeller {
    /// Build a seller.
    #[must_use]
    pub fn new(
        items: Arc<dyn ItemApi>,
        transport: Arc<dyn Transport>,
        data: Arc<dyn GameData>,
        gate: Arc<dyn AutomationGate>,
        stats: StatsHandle,
        log: RemoteLog,
    ) -> Self {
        Self {
            items,
            transport,
            data,
            gate,
            stats,
            log,
        }
    }

    /// Sell every fruit when the `sell` toggle is on.
    ///
    /// Gold is observed from identity updates for up to [`GOLD_WAIT`].
    /// Returns `None` when gated off or when the bag could not be read.
    pub async fn sell_all(&self) -> Option<SellOutcome> {
        if !self.gate.is_automation_on(AutomationDomain::Sell) {
            return None;
        }
        let bag = match self.items.bag().await {
            Ok(bag) => bag,
            Err(err) => {
                self.log.warn("warehouse", format!("sell failed: {err}"));
                return None;
            }
        };

        let selection = self.select_logged(&bag);
        if selection.sellable.is_empty() {
            self.log.info("warehouse", "no fruit to sell");
            return Some(SellOutcome::default());
        }

        let gold_before = self.transport.identity().gold;
        let mut outcome = self.sell_batches(&selection.sellable, false).await;

        let gold_after = self.wait_for_gold(gold_before).await;
        outcome.gold = (gold_after - gold_before).max(0);
        let names = self.names(&selection.sellable);
        if outcome.gold > 0 {
            self.log.info_with(
                "warehouse",
                format!("sold {names}, got {} gold", outcome.gold),
                json!({ "module": "warehouse", "event": "sell", "gold": outcome.gold }),
            );
        } else {
            self.log.warn(
                "warehouse",
                "gold change not received yet, status will update later",
            );
        }
        self.report_partial(&outcome);
        Some(outcome)
    }

    /// Log the whole bag, then sell every fruit regardless of the toggle,
    /// summing gold from the sell replies.
    ///
    /// # Errors
    ///
    /// Returns the bag read failure; batch failures are reported in the outcome.
    pub async fn debug_sell(&self) -> Result<SellOutcome> {
        self.log.info("warehouse", "checking bag");
        let bag = self.items.bag().await?;
        self.log
            .info("warehouse", format!("bag holds {} kinds of items", bag.len()));
        for item in &bag {
            let (kind, name) = if is_fruit(item.id) {
                ("fruit", self.data.fruit_name(item.id))
            } else {
                ("item", "non-fruit".to_owned())
            };
            self.log.info(
                "warehouse",
                format!(
                    "  [{kind}] {name}({}) x{} uid={}",
                    item.id, item.count, item.uid
                ),
            );
        }

        let selection = self.select_logged(&bag);
        if selection.sellable.is_empty() {
            self.log.info("warehouse", "no fruit to sell");
            return Ok(SellOutcome::default());
        }

        self.log.info(
            "warehouse",
            format!(
                "selling {} kinds of fruit, {SELL_BATCH_SIZE} per batch",
                selection.sellable.len()
            ),
        );
        let outcome = self.sell_batches(&selection.sellable, true).await;
        self.log.info(
            "warehouse",
            format!(
                "sold {}, got {} gold",
                self.names(&selection.sellable),
                outcome.gold
            ),
        );
        self.report_partial(&outcome);
        Ok(outcome)
    }

    fn select_logged(&self, bag: &[BagItem]) -> FruitSelection {
        let selection = select_fruits(bag);
        for item in &selection.missing_uid {
            self.log.warn(
                "warehouse",
                format!(
                    "skipping invalid item: id={} count={} (uid missing)",
                    item.id, item.count
                ),
            );
        }
        selection
    }

    async fn sell_batches(&self, fruits: &[BagItem], per_batch_log: bool) -> SellOutcome {
        let mut outcome = SellOutcome::default();
        let batches: Vec<&[BagItem]> = fruits.chunks(SELL_BATCH_SIZE).collect();
        let last = batches.len().saturating_sub(1);

        for (index, batch) in batches.into_iter().enumerate() {
            outcome.batches += 1;
            match self.items.sell(batch.to_vec()).await {
                Ok(receipt) => {
                    outcome.items += batch.len();
                    outcome.gold += receipt.gold;
                    self.stats.record_operation("sell", batch.len() as u64);
                    if per_batch_log {
                        self.log.info(
                            "warehouse",
                            format!("  batch {}: got {} gold", index + 1, receipt.gold),
                        );
                    }
                }
                Err(err) => {
                    outcome.failed_batches += 1;
                    self.log
                        .warn("warehouse", format!("batch {} failed: {err}", index + 1));
                }
            }
            if index < last {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
        }
        outcome
    }

    async fn wait_for_gold(&self, before: i64) -> i64 {
        let started = Instant::now();
        while started.elapsed() < GOLD_WAIT {
            let current = self.transport.identity().gold;
            if current != before {
                return current;
            }
            tokio::time::sleep(GOLD_POLL_STEP).await;
        }
        before
    }

    fn names(&self, fruits: &[BagItem]) -> String {
        fruits
            .iter()
            .map(|item| format!("{}x{}", self.data.fruit_name(item.id), item.count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn report_partial(&self, outcome: &SellOutcome) {
        if outcome.failed_batches > 0 {
            self.log.warn_with(
                "warehouse",
                format!(
                    "{} of {} batches failed",
                    outcome.failed_batches, outcome.batches
                ),
                json!({ "module": "warehouse", "event": "sell", "result": "partial" }),
            );
        }
    }
}

/// Periodic sell loop: first run after `initial_delay`, then every `interval`.
pub async fn run_sell_loop(
    seller: FruitSeller,
    initial_delay: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(initial_delay) => {}
    }
    seller.log.info(
        "warehouse",
        format!("auto-sell started, every {}s", interval.as_secs()),
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("sell loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                seller.sell_all().await;
            }
        }
    }
}
