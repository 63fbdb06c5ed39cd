//! Repository trait definitions (Ports)
//!
//! The engine reads the active robot set and writes back trading results.
//! Activation, ownership and configuration are written elsewhere and must
//! never be overwritten by the engine.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use robotrade_domain::{Robot, RobotId};

/// Repository for Robot entities
#[async_trait]
pub trait RobotRepository: Send + Sync {
    /// Find robots eligible for trading at `now`
    /// (active, not deleted, `plan_start <= now <= plan_end`)
    async fn find_active(&self, now: DateTime<Utc>) -> Result<Vec<Robot>, StoreError>;

    /// Persist the trading results (`fact_yield`, `deals_count`) of a robot.
    ///
    /// Returns `StoreError::NotFound` if the robot does not exist.
    async fn save_trade(&self, robot: &Robot) -> Result<(), StoreError>;

    /// Find a robot by ID
    async fn find_by_id(&self, id: RobotId) -> Result<Option<Robot>, StoreError>;
}
