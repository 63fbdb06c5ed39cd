//! Value Objects for the Robotrade Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Symbol must be a non-empty ticker
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Robot is missing the fields required to trade
    #[error("Robot {0} is not configured for trading")]
    NotTradable(i64),
}

// =============================================================================
// Price
// =============================================================================

/// Price represents a positive decimal price
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidPrice(format!("Price must be positive, got {}", value)));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// Symbol represents a traded instrument ticker (e.g., AAPL)
///
/// # Invariants
/// - Non-empty after trimming
/// - Stored upper-case, so "aapl" and "AAPL" name the same worker
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a Symbol from a ticker string
    ///
    /// # Examples
    /// ```
    /// # use robotrade_domain::Symbol;
    /// let symbol = Symbol::new(" aapl ").unwrap();
    /// assert_eq!(symbol.as_str(), "AAPL");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` if the ticker is blank
    pub fn new(ticker: &str) -> Result<Self, DomainError> {
        let trimmed = ticker.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidSymbol("Ticker must be non-empty".to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidSymbol(format!(
                "Ticker must not contain whitespace: {}",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Get the ticker as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_positive() {
        let price = Price::new(dec!(95.5)).unwrap();
        assert_eq!(price.as_decimal(), dec!(95.5));
    }

    #[test]
    fn test_price_rejects_zero_and_negative() {
        assert!(Price::new(Decimal::ZERO).is_err());
        assert!(Price::new(dec!(-1)).is_err());
    }

    #[test]
    fn test_symbol_normalizes_case() {
        let symbol = Symbol::new("msft").unwrap();
        assert_eq!(symbol.as_str(), "MSFT");
        assert_eq!(symbol, Symbol::new("MSFT").unwrap());
    }

    #[test]
    fn test_symbol_rejects_blank() {
        assert!(matches!(Symbol::new("   "), Err(DomainError::InvalidSymbol(_))));
        assert!(matches!(Symbol::new("BR K"), Err(DomainError::InvalidSymbol(_))));
    }

    #[test]
    fn test_symbol_serde_validates() {
        let symbol: Symbol = serde_json::from_str("\"aapl\"").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");

        let bad: Result<Symbol, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }
}
