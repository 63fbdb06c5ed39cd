//! Trading engine control surface.
//!
//! Wires the reconciler and the hub together:
//!
//! ```text
//! TradingEngine::start()
//!     ├─ EngineHub loop        (root token child)
//!     │     └─ SymbolWorker*   (hub token children)
//!     └─ Reconciler loop       (own token)
//! ```
//!
//! `stop()` halts only the reconciler; workers keep trading until the hub
//! is shut down. `shutdown()` stops the reconciler, then the hub, which
//! stops every worker.

use std::sync::Arc;

use robotrade_feed::PriceFeed;
use robotrade_store::RobotRepository;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::broadcast::RobotBroadcast;
use crate::config::EngineConfig;
use crate::hub::{EngineHub, HubHandle};
use crate::reconciler::Reconciler;
use crate::worker::WorkerContext;

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// The trading engine.
pub struct TradingEngine {
    config: EngineConfig,
    ctx: WorkerContext,
    root: CancellationToken,
    hub: Option<(HubHandle, Running)>,
    reconciler: Option<Running>,
}

impl TradingEngine {
    /// Create an engine; nothing runs until `start`.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RobotRepository>,
        feed: Arc<dyn PriceFeed>,
        sink: Arc<dyn RobotBroadcast>,
    ) -> Self {
        let ctx = WorkerContext {
            feed,
            store,
            sink,
            policy: config.deal_policy,
            capacity: config.worker_capacity,
            resubscribe: config.resubscribe_stalled_feeds,
        };

        Self {
            config,
            ctx,
            root: CancellationToken::new(),
            hub: None,
            reconciler: None,
        }
    }

    /// Launch the hub and the reconciler.
    ///
    /// Calling `start` again after `stop` restarts the reconciler against
    /// the running hub. The new reconciler adopts the hub's symbols before
    /// its first pass, so workers whose robots went inactive in between
    /// are unregistered.
    pub fn start(&mut self) -> HubHandle {
        let handle = match &self.hub {
            Some((handle, _)) => handle.clone(),
            None => {
                let token = self.root.child_token();
                let (handle, task) = EngineHub::spawn(self.ctx.clone(), self.config.hub_capacity, token.clone());
                self.hub = Some((handle.clone(), Running { token, task }));
                handle
            },
        };

        if self.reconciler.is_some() {
            warn!("Trading engine already running");
            return handle;
        }

        let token = self.root.child_token();
        let reconciler = Reconciler::new(self.ctx.store.clone(), handle.clone(), self.config.reconcile_interval);
        let task = reconciler.spawn(token.clone());
        self.reconciler = Some(Running { token, task });

        info!(
            interval_ms = self.config.reconcile_interval.as_millis() as u64,
            policy = ?self.config.deal_policy,
            "Trading engine started"
        );
        handle
    }

    /// Stop the reconciler. Running workers are left alone.
    pub async fn stop(&mut self) {
        if let Some(running) = self.reconciler.take() {
            running.token.cancel();
            if let Err(e) = running.task.await {
                error!(error = %e, "Reconciler task failed");
            }
            info!("Trading engine stopped reconciling");
        }
    }

    /// Stop the reconciler, then the hub and all workers.
    pub async fn shutdown(mut self) {
        self.stop().await;

        if let Some((_, running)) = self.hub.take() {
            running.token.cancel();
            if let Err(e) = running.task.await {
                error!(error = %e, "Engine hub task failed");
            }
        }
        self.root.cancel();

        info!("Trading engine shut down");
    }

    /// Hub handle, if started
    pub fn hub(&self) -> Option<HubHandle> {
        self.hub.as_ref().map(|(handle, _)| handle.clone())
    }

    /// Whether the reconciler is running
    pub fn is_running(&self) -> bool {
        self.reconciler.is_some()
    }
}
