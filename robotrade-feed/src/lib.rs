//! Robotrade Price Feed
//!
//! The port the engine consumes price ticks through, and two adapters:
//!
//! - `StubPriceFeed`: scripted ticks for tests
//! - `SimulatedPriceFeed`: random-walk quotes for development runs
//!
//! A subscription is a bounded channel of `Result<PriceTick, FeedError>`.
//! The stream ends when the sender side is dropped; an `Err` item is a read
//! failure after which the consumer should stop reading.

#![warn(clippy::all)]

mod error;
mod simulated;
mod stub;

use async_trait::async_trait;
use robotrade_domain::{PriceTick, Symbol};
use tokio::sync::mpsc;

pub use error::FeedError;
pub use simulated::{RandomWalk, SimulatedPriceFeed};
pub use stub::StubPriceFeed;

/// Receiving half of a price subscription
pub type PriceStream = mpsc::Receiver<Result<PriceTick, FeedError>>;

/// Price feed client (port)
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Open a price stream for `symbol`.
    async fn subscribe(&self, symbol: &Symbol) -> Result<PriceStream, FeedError>;
}
