//! Robotrade Daemon Library
//!
//! Runtime for the trading robot engine.
//!
//! # Architecture
//!
//! ```text
//! Reconciler (timer) → Engine Hub (registry) → Symbol Worker (per ticker) → Trading Client (per robot)
//!      ↑                                            ↑                             ↓
//!  Robot Store                                 Price Feed               Robot Store + Broadcast
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **TradingEngine**: Start/stop surface for reconciler and hub
//! - **Reconciler**: Periodic diff of active robots against running workers
//! - **EngineHub**: Serialized registry of symbol workers
//! - **SymbolWorker**: Price subscription and client fan-out for one ticker
//! - **TradingClient**: Buy/sell state machine of one robot
//! - **BroadcastHub**: Robot updates for live viewers
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use robotraded::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new_stub(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod broadcast;
pub mod client;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod hub;
pub mod reconciler;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use broadcast::{BroadcastHub, RobotBroadcast, RobotUpdate, UpdateReceiver};
pub use client::TradingClient;
pub use config::{Config, DatabaseConfig, EngineConfig, Environment, FeedConfig};
pub use daemon::Daemon;
pub use engine::TradingEngine;
pub use error::{DaemonError, DaemonResult};
pub use hub::{EngineHub, HubCommand, HubHandle};
pub use reconciler::{ReconcileSummary, Reconciler};
pub use worker::{SymbolWorker, WorkerContext, WorkerHandle};
