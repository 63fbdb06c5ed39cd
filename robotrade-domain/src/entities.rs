//! Domain Entities for Robotrade
//!
//! The robot record as persisted by the storage layer. The trading engine
//! only reads it and mutates the trading result fields.

use crate::value_objects::{DomainError, Price, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a Robot (database serial)
pub type RobotId = i64;

/// Unique identifier for the owning user
pub type UserId = i64;

// =============================================================================
// Robot
// =============================================================================

/// Robot is a user-owned automated trading unit tied to one ticker.
///
/// Nullable columns are modelled as `Option`. A robot is eligible for
/// trading only while it is active, not deleted and inside its plan window;
/// it is tradable only when both thresholds and both result counters are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    /// Unique robot ID
    pub robot_id: RobotId,
    /// User that owns the robot
    pub owner_user_id: UserId,
    /// Robot this one was cloned from
    pub parent_robot_id: Option<RobotId>,

    // Lifecycle flags
    /// Marked as favourite by the owner
    pub is_favourite: bool,
    /// Switched on by the owner
    pub is_active: bool,

    // Trading configuration
    /// Ticker to trade
    pub ticker: Option<Symbol>,
    /// Buy when the quote drops to this price
    pub buy_price: Option<Decimal>,
    /// Sell when the quote rises to this price
    pub sell_price: Option<Decimal>,
    /// Start of the plan window
    pub plan_start: Option<DateTime<Utc>>,
    /// End of the plan window
    pub plan_end: Option<DateTime<Utc>>,
    /// Target yield for the plan window (informational)
    pub plan_yield: Option<Decimal>,

    // Trading results
    /// Accumulated profit of completed deals
    pub fact_yield: Option<Decimal>,
    /// Number of completed buy/sell cycles
    pub deals_count: Option<i64>,

    // Audit
    /// When the robot was last activated
    pub activated_at: Option<DateTime<Utc>>,
    /// When the robot was last deactivated
    pub deactivated_at: Option<DateTime<Utc>>,
    /// When the robot was created
    pub created_at: Option<DateTime<Utc>>,
    /// Soft delete marker
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Buy and sell trigger prices of a tradable robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Buy when the buy quote is at or below this price
    pub buy: Price,
    /// Sell when the sell quote is at or above this price
    pub sell: Price,
}

impl Robot {
    /// Create a freshly registered, inactive robot with no trading configuration
    pub fn new(robot_id: RobotId, owner_user_id: UserId) -> Self {
        Self {
            robot_id,
            owner_user_id,
            parent_robot_id: None,
            is_favourite: false,
            is_active: false,
            ticker: None,
            buy_price: None,
            sell_price: None,
            plan_start: None,
            plan_end: None,
            plan_yield: None,
            fact_yield: None,
            deals_count: None,
            activated_at: None,
            deactivated_at: None,
            created_at: Some(Utc::now()),
            deleted_at: None,
        }
    }

    /// Set the ticker this robot trades
    pub fn with_ticker(mut self, ticker: Symbol) -> Self {
        self.ticker = Some(ticker);
        self
    }

    /// Set buy/sell thresholds and initialise the result counters to zero
    pub fn with_thresholds(mut self, buy_price: Decimal, sell_price: Decimal) -> Self {
        self.buy_price = Some(buy_price);
        self.sell_price = Some(sell_price);
        self.fact_yield.get_or_insert(Decimal::ZERO);
        self.deals_count.get_or_insert(0);
        self
    }

    /// Set the plan window
    pub fn with_plan(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.plan_start = Some(start);
        self.plan_end = Some(end);
        self
    }

    /// Mark the robot active as of `at`
    pub fn activated(mut self, at: DateTime<Utc>) -> Self {
        self.is_active = true;
        self.activated_at = Some(at);
        self.deactivated_at = None;
        self
    }

    /// Check whether the robot should be traded at `now`.
    ///
    /// Both plan bounds must be present; the window is inclusive.
    pub fn is_eligible_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active || self.deleted_at.is_some() {
            return false;
        }

        match (self.plan_start, self.plan_end) {
            (Some(start), Some(end)) => start <= now && now <= end,
            _ => false,
        }
    }

    /// Get the trading thresholds if the robot is fully configured.
    ///
    /// Returns `None` when either threshold or either result counter is
    /// unset, or when a threshold is not a positive price.
    pub fn thresholds(&self) -> Option<Thresholds> {
        self.fact_yield?;
        self.deals_count?;

        let buy = Price::new(self.buy_price?).ok()?;
        let sell = Price::new(self.sell_price?).ok()?;

        Some(Thresholds { buy, sell })
    }

    /// Whether a threshold is set but is not a positive price.
    ///
    /// Such a robot is not tradable; the flag lets callers tell it apart
    /// from one that was simply never configured.
    pub fn has_invalid_thresholds(&self) -> bool {
        [self.buy_price, self.sell_price]
            .iter()
            .flatten()
            .any(|price| *price <= Decimal::ZERO)
    }

    /// Check if the robot is configured for trading
    pub fn is_tradable(&self) -> bool {
        self.thresholds().is_some()
    }

    /// Record one completed buy/sell cycle.
    ///
    /// # Errors
    /// Returns `DomainError::NotTradable` if the result counters are unset
    pub fn record_deal(&mut self, profit: Decimal) -> Result<(), DomainError> {
        match (self.fact_yield.as_mut(), self.deals_count.as_mut()) {
            (Some(fact_yield), Some(deals_count)) => {
                *fact_yield += profit;
                *deals_count += 1;
                Ok(())
            }
            _ => Err(DomainError::NotTradable(self.robot_id)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn tradable_robot() -> Robot {
        let now = Utc::now();
        Robot::new(1, 10)
            .with_ticker(Symbol::new("AAPL").unwrap())
            .with_thresholds(dec!(100), dec!(110))
            .with_plan(now - Duration::hours(1), now + Duration::hours(1))
            .activated(now)
    }

    #[test]
    fn test_new_robot_is_not_tradable() {
        let robot = Robot::new(1, 10);

        assert!(!robot.is_active);
        assert!(!robot.is_tradable());
        assert!(robot.thresholds().is_none());
    }

    #[test]
    fn test_thresholds_require_counters() {
        let mut robot = tradable_robot();
        assert!(robot.is_tradable());

        robot.fact_yield = None;
        assert!(!robot.is_tradable());

        let mut robot = tradable_robot();
        robot.deals_count = None;
        assert!(!robot.is_tradable());
    }

    #[test]
    fn test_thresholds_require_positive_prices() {
        let mut robot = tradable_robot();
        robot.buy_price = Some(Decimal::ZERO);

        assert!(robot.thresholds().is_none());
        assert!(robot.has_invalid_thresholds());

        let mut robot = tradable_robot();
        robot.sell_price = Some(dec!(-5));
        assert!(!robot.is_tradable());
        assert!(robot.has_invalid_thresholds());
    }

    #[test]
    fn test_unset_thresholds_are_not_invalid() {
        let robot = Robot::new(1, 10);
        assert!(!robot.has_invalid_thresholds());
        assert!(!tradable_robot().has_invalid_thresholds());
    }

    #[test]
    fn test_eligibility_window() {
        let now = Utc::now();
        let robot = tradable_robot();
        assert!(robot.is_eligible_at(now));

        assert!(!robot.is_eligible_at(now + Duration::hours(2)));
        assert!(!robot.is_eligible_at(now - Duration::hours(2)));
    }

    #[test]
    fn test_eligibility_window_is_inclusive() {
        let now = Utc::now();
        let robot = tradable_robot().with_plan(now, now);

        assert!(robot.is_eligible_at(now));
    }

    #[test]
    fn test_eligibility_requires_active_and_not_deleted() {
        let now = Utc::now();

        let mut inactive = tradable_robot();
        inactive.is_active = false;
        assert!(!inactive.is_eligible_at(now));

        let mut deleted = tradable_robot();
        deleted.deleted_at = Some(now);
        assert!(!deleted.is_eligible_at(now));

        let mut no_plan = tradable_robot();
        no_plan.plan_end = None;
        assert!(!no_plan.is_eligible_at(now));
    }

    #[test]
    fn test_record_deal() {
        let mut robot = tradable_robot();

        robot.record_deal(dec!(17)).unwrap();
        robot.record_deal(dec!(-2.5)).unwrap();

        assert_eq!(robot.fact_yield, Some(dec!(14.5)));
        assert_eq!(robot.deals_count, Some(2));
    }

    #[test]
    fn test_record_deal_without_counters_fails() {
        let mut robot = Robot::new(7, 10);

        let result = robot.record_deal(dec!(1));
        assert_eq!(result, Err(DomainError::NotTradable(7)));
    }

    #[test]
    fn test_robot_json_roundtrip_keeps_nulls() {
        let robot = Robot::new(3, 4);
        let json = serde_json::to_value(&robot).unwrap();

        assert!(json["ticker"].is_null());
        assert!(json["fact_yield"].is_null());

        let parsed: Robot = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, robot);
    }
}
