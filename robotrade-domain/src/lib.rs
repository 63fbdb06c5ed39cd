//! Robotrade Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the robot record, value objects, and price ticks.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod market_data;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{Robot, RobotId, Thresholds, UserId};
pub use market_data::PriceTick;
pub use value_objects::{DomainError, Price, Symbol};
