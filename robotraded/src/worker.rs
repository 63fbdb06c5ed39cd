//! Per-symbol worker.
//!
//! One worker exists for every symbol traded by at least one active robot.
//! It owns the price subscription for that symbol and the trading clients
//! attached to it.
//!
//! # Architecture
//!
//! ```text
//!            WorkerHandle ──ApplyRobots──► control loop ──┐
//!                                                         │ lock
//!   PriceFeed ──PriceStream──► reader ──tick──► ┌─────────▼─────────┐
//!                                               │ clients (Mutex)   │
//!                                               │ RobotId → Client  │
//!                                               └───────────────────┘
//! ```
//!
//! The control loop and the reader are two tasks. Both take the client set
//! lock: the reader for one fan-out pass, the control loop for one
//! partition-and-apply pass. A detached client therefore never sees another
//! tick, and a retained client keeps its decision state.
//!
//! The reader opens the subscription itself, racing it against the worker
//! token, so the control loop never waits on the feed. A reader ends on
//! subscribe failure, stream error or end-of-stream. Its clients stay
//! attached but dormant until the worker is stopped, or until the next
//! `ApplyRobots` starts a new reader (when resubscription is enabled).
//!
//! Nothing that owns a `WorkerHandle` has to wait for the worker: `cancel`
//! returns at once and `stop` is bounded by [`STOP_GRACE`].

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use robotrade_domain::{PriceTick, Robot, RobotId, Symbol};
use robotrade_engine::{partition, DealPolicy, DealState, MembershipDelta};
use robotrade_feed::{FeedError, PriceFeed, PriceStream};
use robotrade_store::RobotRepository;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broadcast::RobotBroadcast;
use crate::client::TradingClient;
use crate::error::{DaemonError, DaemonResult};

type ClientSet = Arc<Mutex<BTreeMap<RobotId, TradingClient>>>;

/// How long a stopping worker waits for its reader before aborting it.
/// A reader can be held up by a slow trade write inside a fan-out pass.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

// =============================================================================
// Context
// =============================================================================

/// Collaborators and settings shared by every worker.
#[derive(Clone)]
pub struct WorkerContext {
    /// Price feed to subscribe to
    pub feed: Arc<dyn PriceFeed>,
    /// Robot store for trade persistence
    pub store: Arc<dyn RobotRepository>,
    /// Sink for completed deals
    pub sink: Arc<dyn RobotBroadcast>,
    /// Deal policy for new clients
    pub policy: DealPolicy,
    /// Bound of the worker command channel
    pub capacity: usize,
    /// Reopen a dead stream on the next `ApplyRobots`
    pub resubscribe: bool,
}

// =============================================================================
// Commands
// =============================================================================

enum WorkerCommand {
    ApplyRobots {
        robots: Vec<Robot>,
        ack: Option<oneshot::Sender<MembershipDelta>>,
    },
}

// =============================================================================
// Handle
// =============================================================================

/// Owning handle of a running symbol worker.
pub struct WorkerHandle {
    symbol: Symbol,
    commands: mpsc::Sender<WorkerCommand>,
    clients: ClientSet,
    streaming: Arc<AtomicBool>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Symbol this worker trades
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Queue a new robot list for this symbol without waiting.
    ///
    /// # Errors
    /// `WorkerBusy` if the command queue is full, `WorkerClosed` if the
    /// worker has exited.
    pub fn apply_robots(&self, robots: Vec<Robot>) -> DaemonResult<()> {
        self.commands
            .try_send(WorkerCommand::ApplyRobots { robots, ack: None })
            .map_err(|e| match e {
                TrySendError::Full(_) => DaemonError::WorkerBusy(self.symbol.clone()),
                TrySendError::Closed(_) => DaemonError::WorkerClosed(self.symbol.clone()),
            })
    }

    /// Apply a new robot list and wait until it took effect.
    pub async fn apply_robots_and_wait(&self, robots: Vec<Robot>) -> DaemonResult<MembershipDelta> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(WorkerCommand::ApplyRobots {
                robots,
                ack: Some(ack),
            })
            .await
            .map_err(|_| DaemonError::WorkerClosed(self.symbol.clone()))?;

        done.await.map_err(|_| DaemonError::WorkerClosed(self.symbol.clone()))
    }

    /// IDs of attached robots, ascending.
    ///
    /// The returned future owns what it needs, so it can be handed to
    /// another task instead of being awaited by the caller.
    pub fn robot_ids(&self) -> impl Future<Output = Vec<RobotId>> + Send + 'static {
        let clients = self.clients.clone();
        async move { clients.lock().await.keys().copied().collect() }
    }

    /// Decision state of an attached robot
    pub async fn deal_state(&self, id: RobotId) -> Option<DealState> {
        self.clients.lock().await.get(&id).map(TradingClient::state)
    }

    /// In-memory snapshot of an attached robot
    pub async fn robot(&self, id: RobotId) -> Option<Robot> {
        self.clients.lock().await.get(&id).map(|c| c.robot().clone())
    }

    /// Whether a reader is subscribing to or reading the price stream
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Stop the worker: release the subscription and drop every client.
    ///
    /// Waits for the worker task, which itself gives its reader at most
    /// [`STOP_GRACE`].
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(symbol = %self.symbol, error = %e, "Worker task failed");
        }
    }

    /// Signal the worker to stop and return immediately.
    ///
    /// The join is moved to a background task.
    pub fn cancel(self) {
        self.token.cancel();
        tokio::spawn(self.stop());
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Task state of a symbol worker.
pub struct SymbolWorker {
    symbol: Symbol,
    ctx: WorkerContext,
    clients: ClientSet,
    streaming: Arc<AtomicBool>,
    token: CancellationToken,
}

impl SymbolWorker {
    /// Start a worker for `symbol` with its initial robots.
    ///
    /// The subscription is opened by the reader task, so this returns
    /// without waiting on the feed.
    pub fn spawn(symbol: Symbol, robots: Vec<Robot>, ctx: WorkerContext, parent: &CancellationToken) -> WorkerHandle {
        let (commands, receiver) = mpsc::channel(ctx.capacity.max(1));
        let token = parent.child_token();

        let mut initial = BTreeMap::new();
        attach_robots(&symbol, &ctx, &mut initial, robots);

        let worker = Self {
            symbol: symbol.clone(),
            ctx,
            clients: Arc::new(Mutex::new(initial)),
            // The task starts a reader first thing
            streaming: Arc::new(AtomicBool::new(true)),
            token: token.clone(),
        };

        let clients = worker.clients.clone();
        let streaming = worker.streaming.clone();

        let task = tokio::spawn(async move {
            info!(symbol = %worker.symbol, "Worker started");
            worker.run(receiver).await;
        });

        WorkerHandle {
            symbol,
            commands,
            clients,
            streaming,
            token,
            task,
        }
    }

    async fn run(self, mut commands: mpsc::Receiver<WorkerCommand>) {
        let mut reader = self.start_reader();

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                command = commands.recv() => match command {
                    Some(WorkerCommand::ApplyRobots { robots, ack }) => {
                        // The client lock may be held by a slow fan-out pass
                        let delta = tokio::select! {
                            biased;
                            _ = self.token.cancelled() => break,
                            delta = self.apply(robots) => delta,
                        };

                        if self.ctx.resubscribe && !self.streaming.load(Ordering::SeqCst) {
                            info!(symbol = %self.symbol, "Reopening price stream");
                            reader = self.start_reader();
                        }

                        if let Some(ack) = ack {
                            let _ = ack.send(delta);
                        }
                    },
                    None => break,
                },
            }
        }

        // Reader tokens are children of ours
        self.token.cancel();
        match tokio::time::timeout(STOP_GRACE, &mut reader).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => error!(symbol = %self.symbol, error = %e, "Price reader failed"),
            Err(_) => {
                warn!(symbol = %self.symbol, "Price reader did not stop in time, aborting");
                reader.abort();
            },
        }

        let detached = {
            let mut clients = self.clients.lock().await;
            let count = clients.len();
            clients.clear();
            count
        };
        info!(symbol = %self.symbol, detached, "Worker stopped");
    }

    /// Partition and apply a robot list as one unit under the client lock.
    async fn apply(&self, robots: Vec<Robot>) -> MembershipDelta {
        let mut clients = self.clients.lock().await;
        attach_robots(&self.symbol, &self.ctx, &mut clients, robots)
    }

    /// Spawn a reader. The streaming flag stays set until it exits.
    fn start_reader(&self) -> JoinHandle<()> {
        self.streaming.store(true, Ordering::SeqCst);

        let reader = StreamReader {
            symbol: self.symbol.clone(),
            feed: self.ctx.feed.clone(),
            clients: self.clients.clone(),
            streaming: self.streaming.clone(),
            token: self.token.child_token(),
        };
        tokio::spawn(reader.run())
    }
}

/// Bring `clients` in line with `robots`: detach missing robots, refresh
/// retained snapshots, attach new robots.
fn attach_robots(
    symbol: &Symbol,
    ctx: &WorkerContext,
    clients: &mut BTreeMap<RobotId, TradingClient>,
    robots: Vec<Robot>,
) -> MembershipDelta {
    let current: HashSet<RobotId> = clients.keys().copied().collect();
    let delta = partition(&current, robots);

    for id in &delta.removed {
        clients.remove(id);
        info!(symbol = %symbol, robot_id = id, "Client detached");
    }

    for robot in &delta.retained {
        if let Some(client) = clients.get_mut(&robot.robot_id) {
            client.replace_robot(robot.clone());
        }
    }

    for robot in &delta.added {
        let client = TradingClient::new(robot.clone(), ctx.policy, ctx.store.clone(), ctx.sink.clone());
        clients.insert(robot.robot_id, client);
        info!(symbol = %symbol, robot_id = robot.robot_id, "Client attached");
    }

    delta
}

// =============================================================================
// Stream Reader
// =============================================================================

struct StreamReader {
    symbol: Symbol,
    feed: Arc<dyn PriceFeed>,
    clients: ClientSet,
    streaming: Arc<AtomicBool>,
    token: CancellationToken,
}

impl StreamReader {
    async fn run(self) {
        match self.subscribe().await {
            Some(Ok(stream)) => self.read(stream).await,
            Some(Err(e)) => error!(symbol = %self.symbol, error = %e, "Price subscription failed"),
            None => debug!(symbol = %self.symbol, "Cancelled while subscribing"),
        }

        self.streaming.store(false, Ordering::SeqCst);
        debug!(symbol = %self.symbol, "Price reader stopped");
    }

    /// `None` if the worker was cancelled before the feed answered.
    async fn subscribe(&self) -> Option<Result<PriceStream, FeedError>> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = self.feed.subscribe(&self.symbol) => Some(result),
        }
    }

    async fn read(&self, mut stream: PriceStream) {
        debug!(symbol = %self.symbol, "Price reader started");

        loop {
            let item = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                item = stream.recv() => item,
            };

            match item {
                Some(Ok(tick)) => self.fan_out(&tick).await,
                Some(Err(e)) => {
                    error!(symbol = %self.symbol, error = %e, "Price stream failed");
                    break;
                },
                None => {
                    warn!(symbol = %self.symbol, "Price stream ended");
                    break;
                },
            }
        }
    }

    async fn fan_out(&self, tick: &PriceTick) {
        if tick.symbol != self.symbol {
            warn!(symbol = %self.symbol, tick_symbol = %tick.symbol, "Ignoring tick for another symbol");
            return;
        }

        debug!(
            symbol = %self.symbol,
            buy = %tick.buy_price,
            sell = %tick.sell_price,
            "Tick"
        );

        let mut clients = self.clients.lock().await;
        for client in clients.values_mut() {
            client.on_tick(tick).await;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
