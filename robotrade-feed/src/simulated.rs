//! Simulated price feed.
//!
//! Each subscription spawns a task that walks a mid price randomly and
//! emits `buy = mid + spread/2`, `sell = mid - spread/2` on a fixed period.
//! The task ends when the subscriber drops its receiver.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use robotrade_domain::{Price, PriceTick, Symbol};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{FeedError, PriceFeed, PriceStream};

/// Lowest mid price the walk is allowed to reach
const MIN_MID: Decimal = Decimal::ONE;

/// Random-walk parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RandomWalk {
    /// Mid price of the first tick
    pub start_price: Decimal,
    /// Distance between buy and sell quote
    pub spread: Decimal,
    /// Largest absolute mid move per tick
    pub max_step: Decimal,
    /// Tick period
    pub interval: Duration,
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self {
            start_price: Decimal::from(100),
            spread: Decimal::new(5, 1),
            max_step: Decimal::ONE,
            interval: Duration::from_millis(500),
        }
    }
}

impl RandomWalk {
    /// Quotes for a mid price, or `None` if the spread swallows the price
    fn quotes(&self, mid: Decimal) -> Option<(Price, Price)> {
        let half = self.spread / Decimal::TWO;
        let buy = Price::new(mid + half).ok()?;
        let sell = Price::new(mid - half).ok()?;
        Some((buy, sell))
    }

    /// Next mid price, kept above the spread
    fn step(&self, mid: Decimal, rng: &mut impl Rng) -> Decimal {
        // Step in thousandths of max_step
        let factor = Decimal::new(rng.gen_range(-1000..=1000), 3);
        let floor = MIN_MID + self.spread;
        (mid + self.max_step * factor).round_dp(4).max(floor)
    }
}

/// Development price feed producing random-walk quotes.
pub struct SimulatedPriceFeed {
    walk: RandomWalk,
    capacity: usize,
}

impl SimulatedPriceFeed {
    /// Create a feed with the given walk parameters
    pub fn new(walk: RandomWalk) -> Self {
        Self { walk, capacity: 32 }
    }
}

impl Default for SimulatedPriceFeed {
    fn default() -> Self {
        Self::new(RandomWalk::default())
    }
}

#[async_trait]
impl PriceFeed for SimulatedPriceFeed {
    async fn subscribe(&self, symbol: &Symbol) -> Result<PriceStream, FeedError> {
        if self.walk.quotes(self.walk.start_price).is_none() {
            return Err(FeedError::Subscribe {
                symbol: symbol.to_string(),
                message: format!("spread {} too wide for start price {}", self.walk.spread, self.walk.start_price),
            });
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let walk = self.walk.clone();
        let symbol = symbol.clone();

        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut ticker = tokio::time::interval(walk.interval);
            let mut mid = walk.start_price;

            info!(symbol = %symbol, start = %mid, "Simulated feed started");

            loop {
                ticker.tick().await;

                let Some((buy, sell)) = walk.quotes(mid) else {
                    mid = walk.step(mid, &mut rng);
                    continue;
                };

                let tick = PriceTick::new(symbol.clone(), buy, sell, Utc::now());
                if tx.send(Ok(tick)).await.is_err() {
                    break;
                }

                mid = walk.step(mid, &mut rng);
            }

            debug!(symbol = %symbol, "Simulated feed stopped (subscriber gone)");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fast_walk() -> RandomWalk {
        RandomWalk {
            start_price: dec!(100),
            spread: dec!(0.5),
            max_step: dec!(1),
            interval: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_quotes_straddle_mid() {
        let (buy, sell) = fast_walk().quotes(dec!(100)).unwrap();

        assert_eq!(buy.as_decimal(), dec!(100.25));
        assert_eq!(sell.as_decimal(), dec!(99.75));
    }

    #[test]
    fn test_step_is_bounded_and_floored() {
        let walk = fast_walk();
        let mut rng = StdRng::seed_from_u64(7);

        let mut mid = dec!(100);
        for _ in 0..1000 {
            let next = walk.step(mid, &mut rng);
            assert!((next - mid).abs() <= dec!(1) || next == MIN_MID + walk.spread);
            assert!(next >= MIN_MID + walk.spread);
            mid = next;
        }
    }

    #[tokio::test]
    async fn test_stream_produces_valid_ticks() {
        let feed = SimulatedPriceFeed::new(fast_walk());
        let symbol = Symbol::new("AAPL").unwrap();
        let mut rx = feed.subscribe(&symbol).await.unwrap();

        for _ in 0..5 {
            let tick = rx.recv().await.unwrap().unwrap();
            assert_eq!(tick.symbol, symbol);
            assert!(tick.buy_price > tick.sell_price);
        }
    }

    #[tokio::test]
    async fn test_rejects_spread_wider_than_price() {
        let feed = SimulatedPriceFeed::new(RandomWalk {
            start_price: dec!(1),
            spread: dec!(4),
            ..fast_walk()
        });

        let result = feed.subscribe(&Symbol::new("AAPL").unwrap()).await;

        assert!(matches!(result, Err(FeedError::Subscribe { .. })));
    }
}
