//! PostgreSQL robot store.
//!
//! Reads and writes the `robots` table:
//!
//! | column          | type        | column          | type        |
//! |-----------------|-------------|-----------------|-------------|
//! | robot_id        | BIGSERIAL   | plan_end        | TIMESTAMPTZ?|
//! | owner_user_id   | BIGINT      | plan_yield      | NUMERIC?    |
//! | parent_robot_id | BIGINT?     | fact_yield      | NUMERIC?    |
//! | is_favourite    | BOOLEAN     | deals_count     | BIGINT?     |
//! | is_active       | BOOLEAN     | activated_at    | TIMESTAMPTZ?|
//! | ticker          | TEXT?       | deactivated_at  | TIMESTAMPTZ?|
//! | buy_price       | NUMERIC?    | created_at      | TIMESTAMPTZ?|
//! | sell_price      | NUMERIC?    | deleted_at      | TIMESTAMPTZ?|
//! | plan_start      | TIMESTAMPTZ?|                 |             |
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::error::StoreError;
use crate::repository::RobotRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use robotrade_domain::{Robot, RobotId, Symbol};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{info, warn};

const ROBOT_COLUMNS: &str = "robot_id, owner_user_id, parent_robot_id, is_favourite, is_active, ticker, \
     buy_price, sell_price, plan_start, plan_end, plan_yield, fact_yield, deals_count, \
     activated_at, deactivated_at, created_at, deleted_at";

/// PostgreSQL implementation of [`RobotRepository`].
pub struct PgRobotStore {
    /// PostgreSQL connection pool
    pool: Arc<PgPool>,
}

impl PgRobotStore {
    /// Wrap an existing pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with a small pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the underlying pool (for testing).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a `robots` row to a `Robot`.
///
/// A ticker that is not a valid symbol is read as unset, so the robot is
/// skipped by the engine instead of failing the whole query.
fn parse_robot_row(row: &PgRow) -> Result<Robot, sqlx::Error> {
    let robot_id: RobotId = row.try_get("robot_id")?;
    let ticker: Option<String> = row.try_get("ticker")?;
    let ticker = ticker.and_then(|raw| match Symbol::new(&raw) {
        Ok(symbol) => Some(symbol),
        Err(e) => {
            warn!(robot_id, ticker = %raw, error = %e, "Ignoring invalid ticker");
            None
        },
    });

    Ok(Robot {
        robot_id,
        owner_user_id: row.try_get("owner_user_id")?,
        parent_robot_id: row.try_get("parent_robot_id")?,
        is_favourite: row.try_get("is_favourite")?,
        is_active: row.try_get("is_active")?,
        ticker,
        buy_price: row.try_get("buy_price")?,
        sell_price: row.try_get("sell_price")?,
        plan_start: row.try_get("plan_start")?,
        plan_end: row.try_get("plan_end")?,
        plan_yield: row.try_get("plan_yield")?,
        fact_yield: row.try_get("fact_yield")?,
        deals_count: row.try_get("deals_count")?,
        activated_at: row.try_get("activated_at")?,
        deactivated_at: row.try_get("deactivated_at")?,
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[async_trait]
impl RobotRepository for PgRobotStore {
    async fn find_active(&self, now: DateTime<Utc>) -> Result<Vec<Robot>, StoreError> {
        let query = format!(
            "SELECT {ROBOT_COLUMNS} FROM robots \
             WHERE is_active = TRUE \
               AND deleted_at IS NULL \
               AND plan_start <= $1 \
               AND plan_end >= $1 \
             ORDER BY robot_id ASC"
        );

        let rows = sqlx::query(&query)
            .bind(now)
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(|e| StoreError::Database(format!("Failed to read active robots: {}", e)))?;

        rows.iter()
            .map(|row| {
                parse_robot_row(row)
                    .map_err(|e| StoreError::Deserialization(format!("Failed to parse robot row: {}", e)))
            })
            .collect()
    }

    async fn save_trade(&self, robot: &Robot) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE robots SET fact_yield = $2, deals_count = $3 WHERE robot_id = $1")
            .bind(robot.robot_id)
            .bind(robot.fact_yield)
            .bind(robot.deals_count)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("robot", robot.robot_id.to_string()));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: RobotId) -> Result<Option<Robot>, StoreError> {
        let query = format!("SELECT {ROBOT_COLUMNS} FROM robots WHERE robot_id = $1");

        let row = sqlx::query(&query).bind(id).fetch_optional(self.pool.as_ref()).await?;

        row.as_ref()
            .map(parse_robot_row)
            .transpose()
            .map_err(|e| StoreError::Deserialization(format!("Failed to parse robot row: {}", e)))
    }
}
