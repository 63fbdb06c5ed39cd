//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Robot store (memory or PostgreSQL)
//! - Price feed (simulated)
//! - Broadcast hub (robot updates for live viewers)
//! - Trading engine (reconciler, hub, symbol workers)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize components
//! 3. Start the trading engine
//! 4. Main loop (log robot updates)
//! 5. Graceful shutdown on SIGINT

use std::future::Future;
use std::sync::Arc;

use robotrade_feed::{PriceFeed, SimulatedPriceFeed};
use robotrade_store::{MemoryStore, RobotRepository};
use tracing::{info, warn};

use crate::broadcast::BroadcastHub;
use crate::config::Config;
use crate::engine::TradingEngine;
use crate::error::DaemonResult;

// =============================================================================
// Daemon
// =============================================================================

/// The main robotrade daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Robot store
    store: Arc<dyn RobotRepository>,
    /// Price feed
    feed: Arc<dyn PriceFeed>,
    /// Robot update fan-out
    updates: Arc<BroadcastHub>,
}

impl Daemon {
    /// Create a new daemon with provided components.
    pub fn new(
        config: Config,
        store: Arc<dyn RobotRepository>,
        feed: Arc<dyn PriceFeed>,
        updates: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            config,
            store,
            feed,
            updates,
        }
    }

    /// Create a daemon with an in-memory store and the simulated feed.
    pub fn new_stub(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let feed = Arc::new(SimulatedPriceFeed::new(config.feed.random_walk()));
        let updates = Arc::new(BroadcastHub::new(config.engine.broadcast_capacity));
        Self::new(config, store, feed, updates)
    }

    /// Create a daemon from configuration.
    ///
    /// Uses PostgreSQL when built with the `postgres` feature and
    /// `DATABASE_URL` is set, the in-memory store otherwise.
    pub async fn from_config(config: Config) -> DaemonResult<Self> {
        let store = Self::build_store(&config).await?;
        let feed = Arc::new(SimulatedPriceFeed::new(config.feed.random_walk()));
        let updates = Arc::new(BroadcastHub::new(config.engine.broadcast_capacity));
        Ok(Self::new(config, store, feed, updates))
    }

    #[cfg(feature = "postgres")]
    async fn build_store(config: &Config) -> DaemonResult<Arc<dyn RobotRepository>> {
        match &config.database.url {
            Some(url) => {
                let store = robotrade_store::PgRobotStore::connect(url, config.database.max_connections).await?;
                Ok(Arc::new(store))
            },
            None => {
                info!("DATABASE_URL not set, using in-memory store");
                Ok(Arc::new(MemoryStore::new()))
            },
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn build_store(config: &Config) -> DaemonResult<Arc<dyn RobotRepository>> {
        if config.database.url.is_some() {
            warn!("DATABASE_URL is set but postgres support is not compiled in, using in-memory store");
        }
        Ok(Arc::new(MemoryStore::new()))
    }

    /// Robot update fan-out, for viewers
    pub fn updates(&self) -> Arc<BroadcastHub> {
        self.updates.clone()
    }

    /// Run the daemon until SIGINT.
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal");
        })
        .await
    }

    /// Run the daemon until `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting robotrade daemon"
        );

        let mut updates = self.updates.subscribe();
        let mut engine = TradingEngine::new(
            self.config.engine.clone(),
            self.store.clone(),
            self.feed.clone(),
            self.updates.clone(),
        );
        engine.start();

        tokio::pin!(shutdown);

        info!("Entering main loop");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                update = updates.recv() => match update {
                    Some(Ok(update)) => {
                        info!(
                            robot_id = update.robot.robot_id,
                            fact_yield = ?update.robot.fact_yield,
                            deals_count = ?update.robot.deals_count,
                            "Robot updated"
                        );
                    },
                    Some(Err(lag_msg)) => warn!(%lag_msg, "Update receiver lagged"),
                    None => break,
                },
            }
        }

        // Graceful shutdown
        engine.stop().await;
        engine.shutdown().await;
        info!("Daemon stopped");

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
