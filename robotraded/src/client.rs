//! Trading client: one robot's decision state plus its side effects.
//!
//! A client runs inside the symbol worker's fan-out pass; it never has a
//! task of its own. On a completed cycle it records the deal on its robot
//! snapshot, persists the trading fields and publishes the robot.
//! Persistence is best-effort: a failed write is logged and trading goes on.

use std::sync::Arc;

use robotrade_domain::{PriceTick, Robot, RobotId};
use robotrade_engine::{CompletedDeal, DealMachine, DealPolicy, DealState, TickOutcome};
use robotrade_store::RobotRepository;
use tracing::{debug, error, info, warn};

use crate::broadcast::RobotBroadcast;

/// Per-robot trading state machine.
pub struct TradingClient {
    robot: Robot,
    deal: DealMachine,
    store: Arc<dyn RobotRepository>,
    sink: Arc<dyn RobotBroadcast>,
}

impl TradingClient {
    /// Create a client in the `Buying` state.
    pub fn new(
        robot: Robot,
        policy: DealPolicy,
        store: Arc<dyn RobotRepository>,
        sink: Arc<dyn RobotBroadcast>,
    ) -> Self {
        warn_invalid_thresholds(&robot);
        Self {
            robot,
            deal: DealMachine::new(policy),
            store,
            sink,
        }
    }

    /// Robot ID
    pub fn robot_id(&self) -> RobotId {
        self.robot.robot_id
    }

    /// Current robot snapshot (including in-memory trading results)
    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    /// Current decision state
    pub fn state(&self) -> DealState {
        self.deal.state()
    }

    /// Handle one price tick.
    ///
    /// A robot that is not configured for trading ignores every tick.
    pub async fn on_tick(&mut self, tick: &PriceTick) -> TickOutcome {
        let Some(thresholds) = self.robot.thresholds() else {
            debug!(robot_id = self.robot.robot_id, "Robot not tradable, skipping tick");
            return TickOutcome::Idle;
        };

        let outcome = self.deal.on_tick(&thresholds, tick.buy_price, tick.sell_price);

        match outcome {
            TickOutcome::Idle => {},
            TickOutcome::Bought(price) => {
                info!(
                    robot_id = self.robot.robot_id,
                    symbol = %tick.symbol,
                    price = %price,
                    threshold = %thresholds.buy,
                    "Buy leg executed"
                );
            },
            TickOutcome::Completed(deal) => self.complete(deal, tick).await,
        }

        outcome
    }

    /// Replace the robot snapshot, keeping the decision state.
    ///
    /// Trading results are only taken from `fresh` when it is not behind the
    /// in-memory ones: a snapshot read before this client's last write must
    /// not roll back a completed deal.
    pub fn replace_robot(&mut self, fresh: Robot) {
        let keep_results = matches!(
            (self.robot.deals_count, fresh.deals_count),
            (Some(mine), Some(theirs)) if mine > theirs
        );

        if fresh.has_invalid_thresholds() && !self.robot.has_invalid_thresholds() {
            warn_invalid_thresholds(&fresh);
        }

        let (fact_yield, deals_count) = (self.robot.fact_yield, self.robot.deals_count);
        self.robot = fresh;

        if keep_results {
            debug!(robot_id = self.robot.robot_id, "Snapshot behind in-memory results, keeping them");
            self.robot.fact_yield = fact_yield;
            self.robot.deals_count = deals_count;
        }
    }

    async fn complete(&mut self, deal: CompletedDeal, tick: &PriceTick) {
        let profit = deal.profit();
        if let Err(e) = self.robot.record_deal(profit) {
            warn!(robot_id = self.robot.robot_id, error = %e, "Cannot record deal");
            return;
        }

        info!(
            robot_id = self.robot.robot_id,
            symbol = %tick.symbol,
            bought_at = %deal.bought_at,
            sold_at = %deal.sold_at,
            profit = %profit,
            deals_count = ?self.robot.deals_count,
            "Deal completed"
        );

        if let Err(e) = self.store.save_trade(&self.robot).await {
            error!(robot_id = self.robot.robot_id, error = %e, "Failed to persist trade");
        }

        self.sink.publish(&self.robot);
    }
}

fn warn_invalid_thresholds(robot: &Robot) {
    if robot.has_invalid_thresholds() {
        warn!(
            robot_id = robot.robot_id,
            buy_price = ?robot.buy_price,
            sell_price = ?robot.sell_price,
            "Robot thresholds must be positive, robot will not trade"
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use chrono::{Duration, Utc};
    use robotrade_domain::{Price, Symbol};
    use robotrade_store::MemoryStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn aapl() -> Symbol {
        Symbol::new("AAPL").unwrap()
    }

    fn robot() -> Robot {
        let now = Utc::now();
        Robot::new(1, 10)
            .with_ticker(aapl())
            .with_thresholds(dec!(100), dec!(110))
            .with_plan(now - Duration::hours(1), now + Duration::hours(1))
            .activated(now)
    }

    fn tick(buy: Decimal, sell: Decimal) -> PriceTick {
        PriceTick::from_quotes(aapl(), buy, sell).unwrap()
    }

    fn setup(robot: Robot) -> (TradingClient, Arc<MemoryStore>, Arc<BroadcastHub>) {
        let store = Arc::new(MemoryStore::with_robots(vec![robot.clone()]));
        let sink = Arc::new(BroadcastHub::new(16));
        let client = TradingClient::new(robot, DealPolicy::OneLegPerTick, store.clone(), sink.clone());
        (client, store, sink)
    }

    #[tokio::test]
    async fn test_full_cycle_persists_and_publishes() {
        let (mut client, store, sink) = setup(robot());
        let mut viewer = sink.subscribe();

        let first = client.on_tick(&tick(dec!(95), dec!(115))).await;
        assert_eq!(first, TickOutcome::Bought(Price::new(dec!(95)).unwrap()));
        assert_eq!(store.trade_writes(), 0);

        let second = client.on_tick(&tick(dec!(94), dec!(112))).await;
        assert!(matches!(second, TickOutcome::Completed(_)));
        assert_eq!(client.state(), DealState::Buying);

        let stored = store.get(1).unwrap();
        assert_eq!(stored.fact_yield, Some(dec!(17)));
        assert_eq!(stored.deals_count, Some(1));

        let update = viewer.try_recv().unwrap().unwrap();
        assert_eq!(update.robot.fact_yield, Some(dec!(17)));
    }

    #[tokio::test]
    async fn test_unconfigured_robot_never_persists() {
        let mut unconfigured = robot();
        unconfigured.fact_yield = None;
        let (mut client, store, sink) = setup(unconfigured);
        let mut viewer = sink.subscribe();

        for _ in 0..4 {
            let outcome = client.on_tick(&tick(dec!(1), dec!(1000))).await;
            assert_eq!(outcome, TickOutcome::Idle);
        }

        assert_eq!(store.trade_writes(), 0);
        assert!(viewer.try_recv().is_none());
        assert_eq!(client.state(), DealState::Buying);
    }

    #[tokio::test]
    async fn test_non_positive_threshold_never_trades() {
        let mut misconfigured = robot();
        misconfigured.buy_price = Some(Decimal::ZERO);
        let (mut client, store, _sink) = setup(misconfigured);

        for _ in 0..4 {
            let outcome = client.on_tick(&tick(dec!(1), dec!(1000))).await;
            assert_eq!(outcome, TickOutcome::Idle);
        }
        assert_eq!(store.trade_writes(), 0);

        // A corrected snapshot makes it tradable again
        client.replace_robot(robot());
        let outcome = client.on_tick(&tick(dec!(95), dec!(115))).await;
        assert!(matches!(outcome, TickOutcome::Bought(_)));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_swallowed() {
        let (mut client, store, sink) = setup(robot());
        let mut viewer = sink.subscribe();
        store.fail_next_trades(1);

        client.on_tick(&tick(dec!(95), dec!(95))).await;
        let outcome = client.on_tick(&tick(dec!(95), dec!(112))).await;

        assert!(matches!(outcome, TickOutcome::Completed(_)));
        assert_eq!(client.state(), DealState::Buying);
        assert_eq!(client.robot().deals_count, Some(1));
        // Stored counters are stale, the update still goes out
        assert_eq!(store.get(1).unwrap().deals_count, Some(0));
        assert!(viewer.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_replace_robot_keeps_decision_state() {
        let (mut client, _store, _sink) = setup(robot());
        client.on_tick(&tick(dec!(95), dec!(100))).await;

        let updated = robot().with_thresholds(dec!(90), dec!(120));
        client.replace_robot(updated);

        assert!(!client.state().is_buying());
        assert_eq!(client.robot().sell_price, Some(dec!(120)));

        // Old sell threshold no longer triggers
        let outcome = client.on_tick(&tick(dec!(95), dec!(115))).await;
        assert_eq!(outcome, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_replace_robot_keeps_newer_results() {
        let (mut client, _store, _sink) = setup(robot());
        client.on_tick(&tick(dec!(95), dec!(100))).await;
        client.on_tick(&tick(dec!(95), dec!(112))).await;

        // Snapshot read before the write landed
        client.replace_robot(robot());
        assert_eq!(client.robot().deals_count, Some(1));
        assert_eq!(client.robot().fact_yield, Some(dec!(17)));

        // A snapshot that caught up (or was reset by the owner) wins
        let mut reset = robot();
        reset.deals_count = Some(1);
        reset.fact_yield = Some(dec!(0));
        client.replace_robot(reset);
        assert_eq!(client.robot().fact_yield, Some(dec!(0)));
    }
}
