//! Engine hub: the registry of symbol workers.
//!
//! All registry changes go through one command loop, so two reconciliation
//! passes can never race on a worker's lifecycle:
//!
//! ```text
//! Reconciler ──HubHandle──► mpsc ──► EngineHub loop ──► { Symbol → WorkerHandle }
//! ```
//!
//! Commands for one symbol are handled in the order they were sent.
//! Protocol violations (double register, unknown symbol) are logged and
//! ignored. When the loop exits it stops every worker it owns.
//!
//! The loop only ever waits for its next command. Unregister cancels the
//! worker without joining it, broadcast uses `try_send`, and robot-id
//! queries are answered from a spawned task. A worker stuck on its feed or
//! on a trade write therefore cannot stall other symbols. A snapshot
//! dropped on a full worker queue is superseded by the next pass.

use std::collections::BTreeMap;

use robotrade_domain::{Robot, RobotId, Symbol};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DaemonError, DaemonResult};
use crate::worker::{SymbolWorker, WorkerContext, WorkerHandle};

// =============================================================================
// Commands
// =============================================================================

/// Commands processed by the hub loop.
#[derive(Debug)]
pub enum HubCommand {
    /// Create and start a worker for a new symbol
    Register {
        /// Symbol to start
        symbol: Symbol,
        /// Initial robots
        robots: Vec<Robot>,
    },
    /// Stop and remove the worker of a symbol
    Unregister {
        /// Symbol to stop
        symbol: Symbol,
    },
    /// Forward a fresh robot list to an existing worker
    Broadcast {
        /// Target symbol
        symbol: Symbol,
        /// Fresh robot list
        robots: Vec<Robot>,
    },
    /// List registered symbols
    Symbols(oneshot::Sender<Vec<Symbol>>),
    /// List robots attached to a symbol's worker
    RobotIds {
        /// Target symbol
        symbol: Symbol,
        /// Reply channel (`None` if no worker)
        reply: oneshot::Sender<Option<Vec<RobotId>>>,
    },
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable sender side of the hub.
#[derive(Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Wrap a command sender.
    pub fn new(sender: mpsc::Sender<HubCommand>) -> Self {
        Self { sender }
    }

    /// Start a worker for `symbol`.
    pub async fn register(&self, symbol: Symbol, robots: Vec<Robot>) -> DaemonResult<()> {
        self.send(HubCommand::Register { symbol, robots }).await
    }

    /// Stop the worker for `symbol`.
    pub async fn unregister(&self, symbol: Symbol) -> DaemonResult<()> {
        self.send(HubCommand::Unregister { symbol }).await
    }

    /// Forward a fresh robot list to the worker for `symbol`.
    pub async fn broadcast(&self, symbol: Symbol, robots: Vec<Robot>) -> DaemonResult<()> {
        self.send(HubCommand::Broadcast { symbol, robots }).await
    }

    /// Registered symbols, in order.
    pub async fn symbols(&self) -> DaemonResult<Vec<Symbol>> {
        let (reply, answer) = oneshot::channel();
        self.send(HubCommand::Symbols(reply)).await?;
        answer.await.map_err(|_| DaemonError::HubClosed)
    }

    /// Robots attached to the worker for `symbol`, `None` if unregistered.
    pub async fn robot_ids(&self, symbol: Symbol) -> DaemonResult<Option<Vec<RobotId>>> {
        let (reply, answer) = oneshot::channel();
        self.send(HubCommand::RobotIds { symbol, reply }).await?;
        answer.await.map_err(|_| DaemonError::HubClosed)
    }

    /// Whether the hub loop has exited
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, command: HubCommand) -> DaemonResult<()> {
        self.sender.send(command).await.map_err(|_| DaemonError::HubClosed)
    }
}

// =============================================================================
// Hub
// =============================================================================

/// Sequential owner of the symbol worker registry.
pub struct EngineHub {
    ctx: WorkerContext,
    workers: BTreeMap<Symbol, WorkerHandle>,
    token: CancellationToken,
}

impl EngineHub {
    /// Spawn the hub loop.
    ///
    /// The loop runs until `token` is cancelled or every handle is dropped.
    /// Workers inherit child tokens of `token`.
    pub fn spawn(ctx: WorkerContext, capacity: usize, token: CancellationToken) -> (HubHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let hub = Self {
            ctx,
            workers: BTreeMap::new(),
            token,
        };

        let task = tokio::spawn(hub.run(receiver));
        (HubHandle::new(sender), task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<HubCommand>) {
        info!("Engine hub started");

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }

        self.stop_all().await;
        info!("Engine hub stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { symbol, robots } => self.register(symbol, robots),
            HubCommand::Unregister { symbol } => self.unregister(symbol),
            HubCommand::Broadcast { symbol, robots } => self.broadcast(symbol, robots),
            HubCommand::Symbols(reply) => {
                let _ = reply.send(self.workers.keys().cloned().collect());
            },
            HubCommand::RobotIds { symbol, reply } => match self.workers.get(&symbol) {
                Some(worker) => {
                    let ids = worker.robot_ids();
                    tokio::spawn(async move {
                        let _ = reply.send(Some(ids.await));
                    });
                },
                None => {
                    let _ = reply.send(None);
                },
            },
        }
    }

    fn register(&mut self, symbol: Symbol, robots: Vec<Robot>) {
        if self.workers.contains_key(&symbol) {
            warn!(symbol = %symbol, "Symbol already registered, ignoring");
            return;
        }

        info!(symbol = %symbol, robots = robots.len(), "Registering symbol");
        let worker = SymbolWorker::spawn(symbol.clone(), robots, self.ctx.clone(), &self.token);
        self.workers.insert(symbol, worker);
    }

    fn unregister(&mut self, symbol: Symbol) {
        match self.workers.remove(&symbol) {
            Some(worker) => {
                info!(symbol = %symbol, "Unregistering symbol");
                worker.cancel();
            },
            None => warn!(symbol = %symbol, "Unregister for unknown symbol, ignoring"),
        }
    }

    fn broadcast(&mut self, symbol: Symbol, robots: Vec<Robot>) {
        let Some(worker) = self.workers.get(&symbol) else {
            warn!(symbol = %symbol, "Broadcast for unknown symbol, ignoring");
            return;
        };

        debug!(symbol = %symbol, robots = robots.len(), "Forwarding robots to worker");
        match worker.apply_robots(robots) {
            Ok(()) => {},
            Err(DaemonError::WorkerBusy(_)) => {
                warn!(symbol = %symbol, "Worker queue full, dropping robot snapshot");
            },
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Worker rejected robots, dropping it");
                if let Some(worker) = self.workers.remove(&symbol) {
                    worker.cancel();
                }
            },
        }
    }

    async fn stop_all(&mut self) {
        // Signal every worker at once, then join them one by one
        self.token.cancel();
        let workers = std::mem::take(&mut self.workers);
        for (symbol, worker) in workers {
            debug!(symbol = %symbol, "Stopping worker");
            worker.stop().await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
