//! Robotrade Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes input → Returns the decision; the runtime executes it.
//!
//! - `deal`: per-robot buy/sell state machine
//! - `reconcile`: grouping active robots by symbol and diffing against known workers
//! - `membership`: partitioning a worker's robot set into added/removed/retained

#![warn(clippy::all)]

pub mod deal;
pub mod membership;
pub mod reconcile;

pub use deal::{CompletedDeal, DealMachine, DealPolicy, DealState, TickOutcome};
pub use membership::{partition, MembershipDelta};
pub use reconcile::{group_by_symbol, plan, ReconcilePlan, SymbolGroups};
