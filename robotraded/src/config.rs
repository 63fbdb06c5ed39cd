//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use robotrade_engine::DealPolicy;
use robotrade_feed::RandomWalk;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine configuration
    pub engine: EngineConfig,

    /// Simulated price feed configuration
    pub feed: FeedConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the reconciliation pass
    pub reconcile_interval: Duration,
    /// Bound of the hub command channel
    pub hub_capacity: usize,
    /// Bound of each symbol worker's command channel
    pub worker_capacity: usize,
    /// Half-legs a single tick may execute
    pub deal_policy: DealPolicy,
    /// Reopen a dead price stream when the symbol is reconciled again
    pub resubscribe_stalled_feeds: bool,
    /// Ring size of the robot update broadcast
    pub broadcast_capacity: usize,
}

/// Simulated price feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Mid price of the first tick
    pub start_price: Decimal,
    /// Distance between buy and sell quote
    pub spread: Decimal,
    /// Largest mid move per tick
    pub max_step: Decimal,
    /// Tick period
    pub interval: Duration,
}

/// Database configuration.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; the in-memory store is used when unset
    pub url: Option<String>,
    /// Pool size
    pub max_connections: u32,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DaemonResult<Self> {
        let vars = Vars(&lookup);

        Ok(Self {
            environment: Self::load_environment(&vars)?,
            engine: Self::load_engine_config(&vars)?,
            feed: Self::load_feed_config(&vars)?,
            database: Self::load_database_config(&vars)?,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            engine: EngineConfig {
                reconcile_interval: Duration::from_millis(50),
                hub_capacity: 16,
                worker_capacity: 8,
                ..EngineConfig::default()
            },
            feed: FeedConfig {
                interval: Duration::from_millis(10),
                ..FeedConfig::default()
            },
            database: DatabaseConfig::default(),
            environment: Environment::Test,
        }
    }

    fn load_environment(vars: &Vars<'_>) -> DaemonResult<Environment> {
        let env_str = vars.get("ROBOTRADE_ENV").unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid ROBOTRADE_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_engine_config(vars: &Vars<'_>) -> DaemonResult<EngineConfig> {
        let defaults = EngineConfig::default();

        let interval_secs: u64 = vars.parse("ROBOTRADE_RECONCILE_INTERVAL_SECS", 3)?;
        if interval_secs == 0 {
            return Err(DaemonError::Config(
                "Invalid ROBOTRADE_RECONCILE_INTERVAL_SECS: must be > 0".to_string(),
            ));
        }

        let same_tick = vars.parse_bool("ROBOTRADE_SAME_TICK_ROUND_TRIP", false)?;

        Ok(EngineConfig {
            reconcile_interval: Duration::from_secs(interval_secs),
            hub_capacity: vars.parse_capacity("ROBOTRADE_HUB_CAPACITY", defaults.hub_capacity)?,
            worker_capacity: vars.parse_capacity("ROBOTRADE_WORKER_CAPACITY", defaults.worker_capacity)?,
            deal_policy: if same_tick {
                DealPolicy::SameTickRoundTrip
            } else {
                DealPolicy::OneLegPerTick
            },
            resubscribe_stalled_feeds: vars.parse_bool("ROBOTRADE_RESUBSCRIBE_STALLED_FEEDS", true)?,
            broadcast_capacity: vars.parse_capacity("ROBOTRADE_BROADCAST_CAPACITY", defaults.broadcast_capacity)?,
        })
    }

    fn load_feed_config(vars: &Vars<'_>) -> DaemonResult<FeedConfig> {
        let defaults = FeedConfig::default();

        let start_price = vars.parse_decimal("ROBOTRADE_FEED_START_PRICE", defaults.start_price)?;
        let spread = vars.parse_decimal("ROBOTRADE_FEED_SPREAD", defaults.spread)?;
        let max_step = vars.parse_decimal("ROBOTRADE_FEED_MAX_STEP", defaults.max_step)?;
        let interval_ms: u64 = vars.parse("ROBOTRADE_FEED_INTERVAL_MS", 500)?;

        if start_price <= Decimal::ZERO || spread < Decimal::ZERO || max_step < Decimal::ZERO {
            return Err(DaemonError::Config(
                "Invalid ROBOTRADE_FEED_*: start price must be positive, spread and step non-negative"
                    .to_string(),
            ));
        }
        if interval_ms == 0 {
            return Err(DaemonError::Config("Invalid ROBOTRADE_FEED_INTERVAL_MS: must be > 0".to_string()));
        }

        Ok(FeedConfig {
            start_price,
            spread,
            max_step,
            interval: Duration::from_millis(interval_ms),
        })
    }

    fn load_database_config(vars: &Vars<'_>) -> DaemonResult<DatabaseConfig> {
        Ok(DatabaseConfig {
            url: vars.get("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections: vars.parse("ROBOTRADE_DB_MAX_CONNECTIONS", 5)?,
        })
    }
}

/// Typed access to configuration variables.
struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> DaemonResult<T> {
        match self.get(key) {
            Some(val) => val
                .trim()
                .parse::<T>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn parse_capacity(&self, key: &str, default: usize) -> DaemonResult<usize> {
        let value: usize = self.parse(key, default)?;
        if value == 0 {
            return Err(DaemonError::Config(format!("Invalid {}: must be > 0", key)));
        }
        Ok(value)
    }

    fn parse_decimal(&self, key: &str, default: Decimal) -> DaemonResult<Decimal> {
        match self.get(key) {
            Some(val) => Decimal::from_str(val.trim())
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn parse_bool(&self, key: &str, default: bool) -> DaemonResult<bool> {
        match self.get(key).map(|v| v.trim().to_lowercase()) {
            None => Ok(default),
            Some(val) => match val.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            feed: FeedConfig::default(),
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            environment: Environment::Development,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(3),
            hub_capacity: 64,
            worker_capacity: 16,
            deal_policy: DealPolicy::OneLegPerTick,
            resubscribe_stalled_feeds: true,
            broadcast_capacity: 256,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            start_price: Decimal::from(100),
            spread: Decimal::new(5, 1), // 0.5
            max_step: Decimal::ONE,
            interval: Duration::from_millis(500),
        }
    }
}

impl FeedConfig {
    /// Random-walk parameters for the simulated feed
    pub fn random_walk(&self) -> RandomWalk {
        RandomWalk {
            start_price: self.start_price,
            spread: self.spread,
            max_step: self.max_step,
            interval: self.interval,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> DaemonResult<Config> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.engine.reconcile_interval, Duration::from_secs(3));
        assert_eq!(config.engine.deal_policy, DealPolicy::OneLegPerTick);
        assert!(config.engine.resubscribe_stalled_feeds);
        assert_eq!(config.environment, Environment::Development);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.environment, Environment::Test);
        assert!(config.engine.reconcile_interval < Duration::from_secs(1));
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = load(&[]).unwrap();
        let defaults = Config::default();

        assert_eq!(config.engine.reconcile_interval, defaults.engine.reconcile_interval);
        assert_eq!(config.engine.hub_capacity, 64);
        assert_eq!(config.engine.worker_capacity, 16);
        assert_eq!(config.engine.broadcast_capacity, 256);
        assert_eq!(config.feed.start_price, dec!(100));
        assert_eq!(config.feed.spread, dec!(0.5));
        assert_eq!(config.feed.interval, Duration::from_millis(500));
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ROBOTRADE_ENV", "prod"),
            ("ROBOTRADE_RECONCILE_INTERVAL_SECS", "15"),
            ("ROBOTRADE_SAME_TICK_ROUND_TRIP", "true"),
            ("ROBOTRADE_RESUBSCRIBE_STALLED_FEEDS", "off"),
            ("ROBOTRADE_FEED_SPREAD", "0.02"),
            ("DATABASE_URL", "postgres://localhost/robots"),
        ])
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.engine.reconcile_interval, Duration::from_secs(15));
        assert_eq!(config.engine.deal_policy, DealPolicy::SameTickRoundTrip);
        assert!(!config.engine.resubscribe_stalled_feeds);
        assert_eq!(config.feed.spread, dec!(0.02));
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/robots"));
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        let cases = [
            ("ROBOTRADE_ENV", "staging"),
            ("ROBOTRADE_RECONCILE_INTERVAL_SECS", "0"),
            ("ROBOTRADE_RECONCILE_INTERVAL_SECS", "soon"),
            ("ROBOTRADE_HUB_CAPACITY", "0"),
            ("ROBOTRADE_SAME_TICK_ROUND_TRIP", "maybe"),
            ("ROBOTRADE_FEED_START_PRICE", "abc"),
            ("ROBOTRADE_FEED_INTERVAL_MS", "0"),
        ];

        for (key, value) in cases {
            match load(&[(key, value)]) {
                Err(DaemonError::Config(message)) => assert!(message.contains(key), "{}", message),
                other => panic!("expected config error for {}={}, got {:?}", key, value, other),
            }
        }
    }

    #[test]
    fn test_blank_database_url_is_unset() {
        let config = load(&[("DATABASE_URL", "  ")]).unwrap();

        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_random_walk_mapping() {
        let walk = FeedConfig::default().random_walk();

        assert_eq!(walk.start_price, dec!(100));
        assert_eq!(walk.max_step, dec!(1));
    }
}
