//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! Thread-safe using RwLock for concurrent access.

use crate::error::StoreError;
use crate::repository::RobotRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use robotrade_domain::{Robot, RobotId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// In-memory robot store
///
/// Besides the repository port it exposes the writes the (out of process)
/// management API would normally do, plus counters and failure injection
/// for tests.
pub struct MemoryStore {
    robots: RwLock<BTreeMap<RobotId, Robot>>,
    trade_writes: AtomicU64,
    fail_trades: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            robots: RwLock::new(BTreeMap::new()),
            trade_writes: AtomicU64::new(0),
            fail_trades: AtomicUsize::new(0),
        }
    }

    /// Create a store pre-populated with robots
    pub fn with_robots(robots: impl IntoIterator<Item = Robot>) -> Self {
        let store = Self::new();
        for robot in robots {
            store.upsert(robot);
        }
        store
    }

    /// Insert or fully replace a robot (management API write)
    pub fn upsert(&self, robot: Robot) {
        let mut robots = self.robots.write().unwrap_or_else(PoisonError::into_inner);
        robots.insert(robot.robot_id, robot);
    }

    /// Activate or deactivate a robot, stamping `activated_at`/`deactivated_at`
    pub fn set_active(&self, id: RobotId, active: bool) -> Result<(), StoreError> {
        let mut robots = self.robots.write().unwrap_or_else(PoisonError::into_inner);
        let robot = robots
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("robot", id.to_string()))?;

        robot.is_active = active;
        if active {
            robot.activated_at = Some(Utc::now());
        } else {
            robot.deactivated_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark a robot as deleted
    pub fn soft_delete(&self, id: RobotId) -> Result<(), StoreError> {
        let mut robots = self.robots.write().unwrap_or_else(PoisonError::into_inner);
        let robot = robots
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("robot", id.to_string()))?;

        robot.deleted_at = Some(Utc::now());
        Ok(())
    }

    /// Get a copy of a stored robot
    pub fn get(&self, id: RobotId) -> Option<Robot> {
        let robots = self.robots.read().unwrap_or_else(PoisonError::into_inner);
        robots.get(&id).cloned()
    }

    /// Get the number of robots
    pub fn robot_count(&self) -> usize {
        self.robots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of successful `save_trade` calls
    pub fn trade_writes(&self) -> u64 {
        self.trade_writes.load(Ordering::SeqCst)
    }

    /// Make the next `count` `save_trade` calls fail with a database error
    pub fn fail_next_trades(&self, count: usize) {
        self.fail_trades.store(count, Ordering::SeqCst);
    }

    /// Clear all data (useful for test setup)
    pub fn clear(&self) {
        self.robots.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.trade_writes.store(0, Ordering::SeqCst);
        self.fail_trades.store(0, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_trades
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Robot Repository Implementation
// =============================================================================

#[async_trait]
impl RobotRepository for MemoryStore {
    async fn find_active(&self, now: DateTime<Utc>) -> Result<Vec<Robot>, StoreError> {
        let robots = self.robots.read().unwrap_or_else(PoisonError::into_inner);
        Ok(robots.values().filter(|r| r.is_eligible_at(now)).cloned().collect())
    }

    async fn save_trade(&self, robot: &Robot) -> Result<(), StoreError> {
        if self.take_injected_failure() {
            debug!(robot_id = robot.robot_id, "Injected trade write failure");
            return Err(StoreError::Database("injected failure".to_string()));
        }

        let mut robots = self.robots.write().unwrap_or_else(PoisonError::into_inner);
        let stored = robots
            .get_mut(&robot.robot_id)
            .ok_or_else(|| StoreError::not_found("robot", robot.robot_id.to_string()))?;

        // Trading fields only
        stored.fact_yield = robot.fact_yield;
        stored.deals_count = robot.deals_count;

        self.trade_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_by_id(&self, id: RobotId) -> Result<Option<Robot>, StoreError> {
        Ok(self.get(id))
    }
}

// =============================================================================
// Tests
// =============================================================================
