//! Scripted price feed for tests.
//!
//! Every `subscribe` opens a new channel; `push` delivers a tick to every
//! open subscription of that symbol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use robotrade_domain::{PriceTick, Symbol};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{FeedError, PriceFeed, PriceStream};

type TickSender = mpsc::Sender<Result<PriceTick, FeedError>>;

#[derive(Default)]
struct Subscriptions {
    senders: HashMap<Symbol, Vec<TickSender>>,
    opened: HashMap<Symbol, usize>,
}

/// Price feed driven by the test.
pub struct StubPriceFeed {
    capacity: usize,
    subscriptions: Mutex<Subscriptions>,
    fail_subscribes: AtomicUsize,
}

impl StubPriceFeed {
    /// Create a stub with a per-subscription buffer of 64 ticks
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a stub with the given per-subscription buffer
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscriptions: Mutex::new(Subscriptions::default()),
            fail_subscribes: AtomicUsize::new(0),
        }
    }

    /// Deliver a tick to every open subscription of `symbol`.
    ///
    /// Returns the number of subscriptions that received it.
    pub async fn push(&self, symbol: &Symbol, buy: Decimal, sell: Decimal) -> Result<usize, FeedError> {
        let tick = PriceTick::from_quotes(symbol.clone(), buy, sell)?;
        Ok(self.send_all(symbol, Ok(tick)).await)
    }

    /// Deliver a read error to every open subscription of `symbol` and close them.
    pub async fn fail(&self, symbol: &Symbol, message: &str) -> usize {
        let delivered = self.send_all(symbol, Err(FeedError::Stream(message.to_string()))).await;
        self.close(symbol);
        delivered
    }

    /// End every open subscription of `symbol`
    pub fn close(&self, symbol: &Symbol) {
        let mut subs = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        subs.senders.remove(symbol);
    }

    /// Number of `subscribe` calls that succeeded for `symbol`
    pub fn subscription_count(&self, symbol: &Symbol) -> usize {
        let subs = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        subs.opened.get(symbol).copied().unwrap_or(0)
    }

    /// Number of subscriptions of `symbol` whose receiver is still alive
    pub fn open_subscriptions(&self, symbol: &Symbol) -> usize {
        let subs = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        subs.senders
            .get(symbol)
            .map(|senders| senders.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }

    /// Make the next `count` `subscribe` calls fail
    pub fn fail_next_subscribe(&self, count: usize) {
        self.fail_subscribes.store(count, Ordering::SeqCst);
    }

    async fn send_all(&self, symbol: &Symbol, item: Result<PriceTick, FeedError>) -> usize {
        // Clone senders out so the lock is not held across await
        let senders: Vec<TickSender> = {
            let mut subs = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
            match subs.senders.get_mut(symbol) {
                Some(senders) => {
                    senders.retain(|s| !s.is_closed());
                    senders.clone()
                },
                None => Vec::new(),
            }
        };

        let mut delivered = 0;
        for sender in senders {
            if sender.send(item.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        debug!(symbol = %symbol, delivered, "Stub feed delivered item");
        delivered
    }
}

impl Default for StubPriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceFeed for StubPriceFeed {
    async fn subscribe(&self, symbol: &Symbol) -> Result<PriceStream, FeedError> {
        let injected = self
            .fail_subscribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(FeedError::Subscribe {
                symbol: symbol.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        let mut subs = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        subs.senders.entry(symbol.clone()).or_default().push(tx);
        *subs.opened.entry(symbol.clone()).or_default() += 1;

        Ok(rx)
    }
}
