//! Market Data Types
//!
//! Price ticks as delivered by the price feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Price, Symbol};

// =============================================================================
// Price Tick
// =============================================================================

/// One price update for a ticker.
///
/// `buy_price` is the quote a robot can buy at, `sell_price` the quote it
/// can sell at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Ticker the quote is for
    pub symbol: Symbol,
    /// Current buy quote
    pub buy_price: Price,
    /// Current sell quote
    pub sell_price: Price,
    /// When the quote was produced (feed time)
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    /// Create a new tick.
    pub fn new(symbol: Symbol, buy_price: Price, sell_price: Price, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol,
            buy_price,
            sell_price,
            timestamp,
        }
    }

    /// Create a tick from raw decimal quotes, stamped now.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if either quote is not positive
    pub fn from_quotes(
        symbol: Symbol,
        buy_price: rust_decimal::Decimal,
        sell_price: rust_decimal::Decimal,
    ) -> Result<Self, DomainError> {
        Ok(Self::new(
            symbol,
            Price::new(buy_price)?,
            Price::new(sell_price)?,
            Utc::now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_from_quotes() {
        let tick = PriceTick::from_quotes(Symbol::new("AAPL").unwrap(), dec!(95), dec!(115)).unwrap();

        assert_eq!(tick.buy_price.as_decimal(), dec!(95));
        assert_eq!(tick.sell_price.as_decimal(), dec!(115));
    }

    #[test]
    fn test_tick_rejects_non_positive_quote() {
        let result = PriceTick::from_quotes(Symbol::new("AAPL").unwrap(), dec!(0), dec!(115));
        assert!(matches!(result, Err(DomainError::InvalidPrice(_))));
    }
}
