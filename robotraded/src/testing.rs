//! Test doubles for ports that never answer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use robotrade_domain::{Robot, RobotId, Symbol};
use robotrade_feed::{FeedError, PriceFeed, PriceStream};
use robotrade_store::{MemoryStore, RobotRepository, StoreError};

/// Price feed whose `subscribe` hangs forever, like a connect that stalled.
pub struct StalledFeed;

#[async_trait]
impl PriceFeed for StalledFeed {
    async fn subscribe(&self, _symbol: &Symbol) -> Result<PriceStream, FeedError> {
        std::future::pending().await
    }
}

/// Store that reads from memory but whose trade writes hang forever.
#[derive(Default)]
pub struct StalledTradeStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl RobotRepository for StalledTradeStore {
    async fn find_active(&self, now: DateTime<Utc>) -> Result<Vec<Robot>, StoreError> {
        self.inner.find_active(now).await
    }

    async fn save_trade(&self, _robot: &Robot) -> Result<(), StoreError> {
        std::future::pending().await
    }

    async fn find_by_id(&self, id: RobotId) -> Result<Option<Robot>, StoreError> {
        self.inner.find_by_id(id).await
    }
}
