//! Daemon error types.

use robotrade_domain::Symbol;
use robotrade_store::StoreError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The engine hub loop is no longer running
    #[error("Engine hub is closed")]
    HubClosed,

    /// A symbol worker's control loop is no longer running
    #[error("Symbol worker closed: {0}")]
    WorkerClosed(Symbol),

    /// A symbol worker's command queue is full
    #[error("Symbol worker busy: {0}")]
    WorkerBusy(Symbol),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
