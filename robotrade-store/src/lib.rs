//! Robotrade Storage Layer
//!
//! Provides persistence for robots.
//!
//! # Architecture
//!
//! - **Repository trait**: Defines the storage interface (port)
//! - **In-memory store**: Fast implementation for testing and development
//! - **PostgreSQL store**: Production implementation (feature `postgres`)
//!
//! # Usage
//!
//! ```rust
//! use robotrade_store::{MemoryStore, RobotRepository};
//! use robotrade_domain::{Robot, Symbol};
//! use chrono::{Duration, Utc};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     let now = Utc::now();
//!
//!     let robot = Robot::new(1, 42)
//!         .with_ticker(Symbol::new("AAPL").unwrap())
//!         .with_thresholds(Decimal::from(100), Decimal::from(110))
//!         .with_plan(now - Duration::hours(1), now + Duration::hours(1))
//!         .activated(now);
//!     store.upsert(robot);
//!
//!     let active = store.find_active(now).await.unwrap();
//!     println!("Active robots: {}", active.len());
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgRobotStore;
pub use repository::RobotRepository;
