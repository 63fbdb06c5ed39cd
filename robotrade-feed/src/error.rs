//! Price feed errors

use thiserror::Error;

/// Errors raised by a price feed
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// The subscription could not be opened
    #[error("Subscribe failed for {symbol}: {message}")]
    Subscribe {
        /// Requested symbol
        symbol: String,
        /// Failure reason
        message: String,
    },

    /// Reading from an open stream failed
    #[error("Stream error: {0}")]
    Stream(String),

    /// Quote could not be turned into a valid tick
    #[error("Domain error: {0}")]
    Domain(#[from] robotrade_domain::DomainError),
}
