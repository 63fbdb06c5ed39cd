//! Reconciler: the engine's only polling point.
//!
//! On every interval it reads the active robots, groups them by symbol,
//! diffs the groups against the symbols it registered before and sends the
//! resulting register / unregister / broadcast commands to the hub.
//!
//! A failed store read skips the pass and leaves the known symbols alone,
//! so a transient database error never tears down running workers.
//!
//! The spawned loop seeds its known symbols from the hub before the first
//! pass. A reconciler restarted against a live hub therefore unregisters
//! workers whose robots went inactive while it was stopped.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use robotrade_domain::Symbol;
use robotrade_engine::{group_by_symbol, plan};
use robotrade_store::RobotRepository;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DaemonError, DaemonResult};
use crate::hub::HubHandle;

/// Counts of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Active robots read from the store
    pub robots: usize,
    /// Register commands sent
    pub registered: usize,
    /// Unregister commands sent
    pub unregistered: usize,
    /// Broadcast commands sent
    pub broadcast: usize,
}

/// Periodic diff of active robots against running workers.
pub struct Reconciler {
    store: Arc<dyn RobotRepository>,
    hub: HubHandle,
    known: BTreeSet<Symbol>,
    interval: Duration,
}

impl Reconciler {
    /// Create a reconciler with no known symbols.
    pub fn new(store: Arc<dyn RobotRepository>, hub: HubHandle, interval: Duration) -> Self {
        Self {
            store,
            hub,
            known: BTreeSet::new(),
            interval,
        }
    }

    /// Symbols registered by previous passes
    pub fn known_symbols(&self) -> &BTreeSet<Symbol> {
        &self.known
    }

    /// Run one reconciliation pass as of `now`.
    ///
    /// Known symbols are updated command by command, so a hub that closes
    /// mid-pass leaves them matching what was actually sent.
    pub async fn reconcile_once(&mut self, now: DateTime<Utc>) -> DaemonResult<ReconcileSummary> {
        let robots = self.store.find_active(now).await?;
        let mut summary = ReconcileSummary {
            robots: robots.len(),
            ..ReconcileSummary::default()
        };

        let plan = plan(&self.known, group_by_symbol(robots));

        for (symbol, robots) in plan.register {
            self.hub.register(symbol.clone(), robots).await?;
            self.known.insert(symbol);
            summary.registered += 1;
        }

        for symbol in plan.unregister {
            self.hub.unregister(symbol.clone()).await?;
            self.known.remove(&symbol);
            summary.unregistered += 1;
        }

        for (symbol, robots) in plan.broadcast {
            self.hub.broadcast(symbol, robots).await?;
            summary.broadcast += 1;
        }

        Ok(summary)
    }

    /// Adopt the symbols the hub already runs workers for.
    pub async fn seed_from_hub(&mut self) -> DaemonResult<usize> {
        let symbols = self.hub.symbols().await?;
        self.known = symbols.into_iter().collect();
        Ok(self.known.len())
    }

    /// Spawn the interval loop. The first pass runs immediately.
    ///
    /// Cancellation is honoured inside a pass as well as between passes.
    pub fn spawn(mut self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let seeded = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Reconciler stopped");
                    return;
                },
                seeded = self.seed_from_hub() => seeded,
            };
            match seeded {
                Ok(known) => info!(
                    interval_ms = self.interval.as_millis() as u64,
                    known,
                    "Reconciler started"
                ),
                Err(e) => {
                    warn!(error = %e, "Engine hub closed, reconciler exiting");
                    return;
                },
            }

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {},
                }

                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    result = self.reconcile_once(Utc::now()) => result,
                };

                match result {
                    Ok(summary) if summary.registered + summary.unregistered > 0 => {
                        info!(
                            robots = summary.robots,
                            registered = summary.registered,
                            unregistered = summary.unregistered,
                            broadcast = summary.broadcast,
                            "Reconciliation pass"
                        );
                    },
                    Ok(summary) => {
                        debug!(robots = summary.robots, broadcast = summary.broadcast, "Reconciliation pass");
                    },
                    Err(DaemonError::HubClosed) => {
                        warn!("Engine hub closed, reconciler exiting");
                        break;
                    },
                    Err(e) => error!(error = %e, "Reconciliation pass failed, skipping"),
                }
            }

            info!("Reconciler stopped");
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
