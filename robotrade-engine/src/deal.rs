//! Deal State Machine
//!
//! One `DealMachine` per robot. It alternates between buying and selling:
//!
//! ```text
//!   Buying ──(buy quote <= buy threshold)──► Selling { bought_at }
//!      ▲                                         │
//!      └──(sell quote >= sell threshold)─────────┘  => CompletedDeal
//! ```
//!
//! The machine holds only the decision state. Thresholds are passed in on
//! every tick so that a robot snapshot can be replaced without touching an
//! in-progress trade.

use robotrade_domain::{Price, Thresholds};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// Policy
// =============================================================================

/// How many half-legs a single tick may execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealPolicy {
    /// A tick runs at most one half-leg. A buy on tick N is sold at the
    /// earliest on tick N+1.
    #[default]
    OneLegPerTick,
    /// A tick that triggers a buy is also checked for the sell, so one tick
    /// can complete a whole cycle.
    SameTickRoundTrip,
}

// =============================================================================
// State
// =============================================================================

/// Decision state of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealState {
    /// Waiting for the buy quote to reach the buy threshold (initial state)
    Buying,
    /// Holding, waiting for the sell quote to reach the sell threshold
    Selling {
        /// Executed buy price of the open leg
        bought_at: Price,
    },
}

impl DealState {
    /// Check if the machine is waiting to buy
    pub fn is_buying(&self) -> bool {
        matches!(self, DealState::Buying)
    }
}

/// One full buy-then-sell round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedDeal {
    /// Executed buy price
    pub bought_at: Price,
    /// Executed sell price
    pub sold_at: Price,
}

impl CompletedDeal {
    /// Realised profit (sell - buy). Can be negative if thresholds were
    /// changed between the legs.
    pub fn profit(&self) -> Decimal {
        self.sold_at.as_decimal() - self.bought_at.as_decimal()
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing executed
    Idle,
    /// Buy leg executed at the given price
    Bought(Price),
    /// Sell leg executed and the cycle is complete
    Completed(CompletedDeal),
}

// =============================================================================
// Machine
// =============================================================================

/// Buy/sell decision state machine for one robot.
#[derive(Debug, Clone)]
pub struct DealMachine {
    policy: DealPolicy,
    state: DealState,
    last_deal: Option<CompletedDeal>,
}

impl DealMachine {
    /// Create a machine in the `Buying` state.
    pub fn new(policy: DealPolicy) -> Self {
        Self {
            policy,
            state: DealState::Buying,
            last_deal: None,
        }
    }

    /// Current decision state
    pub fn state(&self) -> DealState {
        self.state
    }

    /// Policy the machine was created with
    pub fn policy(&self) -> DealPolicy {
        self.policy
    }

    /// Most recent completed cycle, if any
    pub fn last_deal(&self) -> Option<CompletedDeal> {
        self.last_deal
    }

    /// Evaluate one tick against the robot's thresholds.
    ///
    /// A tick that completes a cycle resets the machine to `Buying` but never
    /// evaluates the next buy; that happens on the following tick.
    pub fn on_tick(&mut self, thresholds: &Thresholds, buy_quote: Price, sell_quote: Price) -> TickOutcome {
        let mut bought = None;

        if self.state.is_buying() {
            if buy_quote > thresholds.buy {
                return TickOutcome::Idle;
            }

            debug!(%buy_quote, threshold = %thresholds.buy, "Buy leg triggered");
            self.state = DealState::Selling { bought_at: buy_quote };

            if self.policy == DealPolicy::OneLegPerTick {
                return TickOutcome::Bought(buy_quote);
            }
            bought = Some(buy_quote);
        }

        if let DealState::Selling { bought_at } = self.state {
            if sell_quote >= thresholds.sell {
                debug!(%sell_quote, threshold = %thresholds.sell, "Sell leg triggered");
                let deal = CompletedDeal {
                    bought_at,
                    sold_at: sell_quote,
                };
                self.state = DealState::Buying;
                self.last_deal = Some(deal);
                return TickOutcome::Completed(deal);
            }
        }

        match bought {
            Some(price) => TickOutcome::Bought(price),
            None => TickOutcome::Idle,
        }
    }
}

impl Default for DealMachine {
    fn default() -> Self {
        Self::new(DealPolicy::default())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(value: Decimal) -> Price {
        Price::new(value).unwrap()
    }

    fn thresholds(buy: Decimal, sell: Decimal) -> Thresholds {
        Thresholds {
            buy: price(buy),
            sell: price(sell),
        }
    }

    #[test]
    fn test_no_premature_buy() {
        let mut machine = DealMachine::default();
        let t = thresholds(dec!(100), dec!(110));

        for quote in [dec!(100.01), dec!(105), dec!(250)] {
            let outcome = machine.on_tick(&t, price(quote), price(dec!(500)));
            assert_eq!(outcome, TickOutcome::Idle);
            assert_eq!(machine.state(), DealState::Buying);
        }
    }

    #[test]
    fn test_buy_at_threshold_is_inclusive() {
        let mut machine = DealMachine::default();
        let t = thresholds(dec!(100), dec!(110));

        let outcome = machine.on_tick(&t, price(dec!(100)), price(dec!(101)));

        assert_eq!(outcome, TickOutcome::Bought(price(dec!(100))));
        assert_eq!(
            machine.state(),
            DealState::Selling {
                bought_at: price(dec!(100))
            }
        );
    }

    #[test]
    fn test_two_tick_cycle() {
        let mut machine = DealMachine::default();
        let t = thresholds(dec!(100), dec!(110));

        let first = machine.on_tick(&t, price(dec!(95)), price(dec!(115)));
        assert_eq!(first, TickOutcome::Bought(price(dec!(95))));

        let second = machine.on_tick(&t, price(dec!(94)), price(dec!(112)));
        let deal = match second {
            TickOutcome::Completed(deal) => deal,
            other => panic!("expected completed deal, got {:?}", other),
        };

        assert_eq!(deal.bought_at, price(dec!(95)));
        assert_eq!(deal.sold_at, price(dec!(112)));
        assert_eq!(deal.profit(), dec!(17));
        assert_eq!(machine.state(), DealState::Buying);
        assert_eq!(machine.last_deal(), Some(deal));
    }

    #[test]
    fn test_sell_below_threshold_keeps_position() {
        let mut machine = DealMachine::default();
        let t = thresholds(dec!(100), dec!(110));

        machine.on_tick(&t, price(dec!(99)), price(dec!(100)));
        let outcome = machine.on_tick(&t, price(dec!(120)), price(dec!(109.99)));

        assert_eq!(outcome, TickOutcome::Idle);
        assert_eq!(
            machine.state(),
            DealState::Selling {
                bought_at: price(dec!(99))
            }
        );
    }

    #[test]
    fn test_one_leg_policy_does_not_sell_on_buy_tick() {
        let mut machine = DealMachine::new(DealPolicy::OneLegPerTick);
        let t = thresholds(dec!(100), dec!(110));

        let outcome = machine.on_tick(&t, price(dec!(95)), price(dec!(115)));

        assert_eq!(outcome, TickOutcome::Bought(price(dec!(95))));
        assert!(machine.last_deal().is_none());
    }

    #[test]
    fn test_same_tick_round_trip_policy() {
        let mut machine = DealMachine::new(DealPolicy::SameTickRoundTrip);
        let t = thresholds(dec!(100), dec!(110));

        let outcome = machine.on_tick(&t, price(dec!(95)), price(dec!(115)));

        match outcome {
            TickOutcome::Completed(deal) => assert_eq!(deal.profit(), dec!(20)),
            other => panic!("expected completed deal, got {:?}", other),
        }
        assert_eq!(machine.state(), DealState::Buying);
    }

    #[test]
    fn test_same_tick_policy_still_buys_only_when_sell_not_reached() {
        let mut machine = DealMachine::new(DealPolicy::SameTickRoundTrip);
        let t = thresholds(dec!(100), dec!(110));

        let outcome = machine.on_tick(&t, price(dec!(95)), price(dec!(105)));

        assert_eq!(outcome, TickOutcome::Bought(price(dec!(95))));
    }

    #[test]
    fn test_completing_tick_never_opens_next_buy() {
        for policy in [DealPolicy::OneLegPerTick, DealPolicy::SameTickRoundTrip] {
            let mut machine = DealMachine::new(policy);
            let t = thresholds(dec!(100), dec!(110));

            machine.on_tick(&t, price(dec!(95)), price(dec!(105)));
            // Buy quote also satisfies the buy threshold on the closing tick
            let outcome = machine.on_tick(&t, price(dec!(90)), price(dec!(111)));

            assert!(matches!(outcome, TickOutcome::Completed(_)));
            assert_eq!(machine.state(), DealState::Buying, "policy {:?}", policy);
        }
    }

    #[test]
    fn test_threshold_change_applies_to_open_leg() {
        let mut machine = DealMachine::default();

        machine.on_tick(&thresholds(dec!(100), dec!(110)), price(dec!(100)), price(dec!(100)));

        // Sell threshold lowered while holding
        let outcome = machine.on_tick(&thresholds(dec!(100), dec!(98)), price(dec!(200)), price(dec!(98)));

        match outcome {
            TickOutcome::Completed(deal) => assert_eq!(deal.profit(), dec!(-2)),
            other => panic!("expected completed deal, got {:?}", other),
        }
    }
}
