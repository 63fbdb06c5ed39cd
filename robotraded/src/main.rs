//! Robotrade Daemon
//!
//! Runs the trading engine against the configured robot store and the
//! simulated price feed.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p robotraded
//!
//! # Faster reconciliation, JSON logs
//! ROBOTRADE_RECONCILE_INTERVAL_SECS=1 ROBOTRADE_LOG_FORMAT=json cargo run -p robotraded
//!
//! # PostgreSQL store
//! DATABASE_URL=postgres://localhost/robots cargo run -p robotraded --features postgres
//! ```
//!
//! # Environment Variables
//!
//! - `ROBOTRADE_ENV`: Environment (test, development, production)
//! - `ROBOTRADE_RECONCILE_INTERVAL_SECS`: Reconciliation period (default: 3)
//! - `ROBOTRADE_HUB_CAPACITY`: Hub command buffer (default: 64)
//! - `ROBOTRADE_WORKER_CAPACITY`: Worker command buffer (default: 16)
//! - `ROBOTRADE_SAME_TICK_ROUND_TRIP`: Allow buy and sell on one tick (default: false)
//! - `ROBOTRADE_RESUBSCRIBE_STALLED_FEEDS`: Reopen dead price streams (default: true)
//! - `ROBOTRADE_BROADCAST_CAPACITY`: Robot update buffer (default: 256)
//! - `ROBOTRADE_FEED_START_PRICE` / `_SPREAD` / `_MAX_STEP` / `_INTERVAL_MS`: Simulated feed
//! - `ROBOTRADE_DB_MAX_CONNECTIONS`: PostgreSQL pool size (default: 5)
//! - `ROBOTRADE_LOG_FORMAT`: `json` for JSON logs
//! - `DATABASE_URL`: PostgreSQL URL (with the `postgres` feature)

use robotraded::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    let _ = dotenvy::dotenv();

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("robotraded=info".parse()?);
    let json = std::env::var("ROBOTRADE_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry().with(fmt::layer().json()).with(filter).init();
    } else {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        reconcile_interval_secs = config.engine.reconcile_interval.as_secs(),
        policy = ?config.engine.deal_policy,
        "Robotrade Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::from_config(config).await?;
    daemon.run().await?;

    Ok(())
}
