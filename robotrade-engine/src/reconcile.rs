//! Reconciliation Planning
//!
//! Turns the active-robot snapshot into hub commands:
//!
//! ```text
//! active robots ──group_by_symbol──► SymbolGroups ──plan(known)──► ReconcilePlan
//!                                                                  ├─ register   (new symbols)
//!                                                                  ├─ unregister (gone symbols)
//!                                                                  └─ broadcast  (still present)
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use robotrade_domain::{Robot, Symbol};
use tracing::debug;

/// Active robots grouped by ticker, in ticker order.
pub type SymbolGroups = BTreeMap<Symbol, Vec<Robot>>;

// =============================================================================
// Grouping
// =============================================================================

/// Group robots by ticker.
///
/// A robot id is kept only on its first occurrence. Robots without a ticker
/// cannot be traded and are skipped. Tickers are compared as normalized
/// symbols, so `aapl` and `AAPL` share one group.
pub fn group_by_symbol(robots: impl IntoIterator<Item = Robot>) -> SymbolGroups {
    let mut seen = HashSet::new();
    let mut groups = SymbolGroups::new();

    for robot in robots {
        let Some(symbol) = robot.ticker.clone() else {
            debug!(robot_id = robot.robot_id, "Skipping robot without ticker");
            continue;
        };

        if !seen.insert(robot.robot_id) {
            debug!(robot_id = robot.robot_id, "Skipping duplicate robot");
            continue;
        }

        groups.entry(symbol).or_default().push(robot);
    }

    groups
}

// =============================================================================
// Plan
// =============================================================================

/// Commands one reconciliation pass issues to the hub.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Symbols with no worker yet, with their initial robots
    pub register: Vec<(Symbol, Vec<Robot>)>,
    /// Symbols with no active robot left
    pub unregister: Vec<Symbol>,
    /// Symbols that keep their worker, with the fresh robot list
    pub broadcast: Vec<(Symbol, Vec<Robot>)>,
}

impl ReconcilePlan {
    /// Symbols known after this plan has been applied
    pub fn next_known(&self) -> BTreeSet<Symbol> {
        self.register
            .iter()
            .chain(self.broadcast.iter())
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    /// Check if the plan creates or destroys any worker
    pub fn changes_workers(&self) -> bool {
        !self.register.is_empty() || !self.unregister.is_empty()
    }
}

/// Diff grouped robots against the symbols known from the previous pass.
pub fn plan(known: &BTreeSet<Symbol>, groups: SymbolGroups) -> ReconcilePlan {
    let mut result = ReconcilePlan {
        unregister: known.iter().filter(|s| !groups.contains_key(*s)).cloned().collect(),
        ..ReconcilePlan::default()
    };

    for (symbol, robots) in groups {
        if known.contains(&symbol) {
            result.broadcast.push((symbol, robots));
        } else {
            result.register.push((symbol, robots));
        }
    }

    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sym(ticker: &str) -> Symbol {
        Symbol::new(ticker).unwrap()
    }

    fn robot(id: i64, ticker: &str) -> Robot {
        Robot::new(id, 1).with_ticker(sym(ticker)).with_thresholds(dec!(100), dec!(110))
    }

    fn ids(robots: &[Robot]) -> Vec<i64> {
        robots.iter().map(|r| r.robot_id).collect()
    }

    #[test]
    fn test_group_by_symbol() {
        let groups = group_by_symbol(vec![robot(1, "AAPL"), robot(2, "MSFT"), robot(3, "aapl")]);

        assert_eq!(groups.len(), 2);
        assert_eq!(ids(&groups[&sym("AAPL")]), vec![1, 3]);
        assert_eq!(ids(&groups[&sym("MSFT")]), vec![2]);
    }

    #[test]
    fn test_group_dedupes_by_first_occurrence() {
        let mut moved = robot(1, "MSFT");
        moved.buy_price = Some(dec!(1));

        let groups = group_by_symbol(vec![robot(1, "AAPL"), robot(1, "AAPL"), moved]);

        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[&sym("AAPL")]), vec![1]);
    }

    #[test]
    fn test_group_skips_robots_without_ticker() {
        let groups = group_by_symbol(vec![Robot::new(9, 1), robot(1, "AAPL")]);

        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key(&sym("AAPL")));
    }

    #[test]
    fn test_plan_first_pass_registers_everything() {
        let groups = group_by_symbol(vec![robot(1, "AAPL"), robot(2, "MSFT")]);

        let plan = plan(&BTreeSet::new(), groups);

        assert_eq!(plan.register.len(), 2);
        assert!(plan.unregister.is_empty());
        assert!(plan.broadcast.is_empty());
        assert_eq!(plan.next_known(), BTreeSet::from([sym("AAPL"), sym("MSFT")]));
    }

    #[test]
    fn test_plan_deactivated_symbol_is_unregistered() {
        let known = BTreeSet::from([sym("AAPL"), sym("MSFT")]);
        let groups = group_by_symbol(vec![robot(1, "AAPL")]);

        let plan = plan(&known, groups);

        assert!(plan.register.is_empty());
        assert_eq!(plan.unregister, vec![sym("MSFT")]);
        assert_eq!(plan.broadcast.len(), 1);
        assert_eq!(plan.broadcast[0].0, sym("AAPL"));
        assert_eq!(ids(&plan.broadcast[0].1), vec![1]);
        assert_eq!(plan.next_known(), BTreeSet::from([sym("AAPL")]));
    }

    #[test]
    fn test_plan_is_idempotent_for_unchanged_set() {
        let robots = vec![robot(1, "AAPL"), robot(2, "MSFT")];
        let first = plan(&BTreeSet::new(), group_by_symbol(robots.clone()));

        let second = plan(&first.next_known(), group_by_symbol(robots));

        assert!(!second.changes_workers());
        assert_eq!(second.broadcast.len(), 2);
    }

    #[test]
    fn test_plan_empty_snapshot_unregisters_all() {
        let known = BTreeSet::from([sym("AAPL")]);

        let plan = plan(&known, SymbolGroups::new());

        assert_eq!(plan.unregister, vec![sym("AAPL")]);
        assert!(plan.next_known().is_empty());
    }
}
