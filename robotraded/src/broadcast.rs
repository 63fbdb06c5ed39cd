//! Broadcast sink for robot updates.
//!
//! Completed deals are pushed to live viewers through `RobotBroadcast`.
//! Publishing is fire-and-forget: the engine never waits on viewers.
//!
//! `BroadcastHub` is the in-process implementation, a tokio broadcast
//! channel fanned out to any number of subscribers.

use chrono::{DateTime, Utc};
use robotrade_domain::Robot;
use serde::Serialize;
use tokio::sync::broadcast;

// =============================================================================
// Port
// =============================================================================

/// Sink for updated robot records.
pub trait RobotBroadcast: Send + Sync {
    /// Publish an updated robot. Must not block.
    fn publish(&self, robot: &Robot);
}

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Robot update as seen by viewers.
#[derive(Debug, Clone, Serialize)]
pub struct RobotUpdate {
    /// Robot snapshot after the update
    pub robot: Robot,
    /// When the update was published
    pub published_at: DateTime<Utc>,
}

/// Fan-out of robot updates to in-process viewers.
///
/// Capacity determines how many updates can be buffered before slow
/// viewers start missing updates (lagging).
pub struct BroadcastHub {
    sender: broadcast::Sender<RobotUpdate>,
}

impl BroadcastHub {
    /// Create a new hub with specified capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to updates published after this call.
    pub fn subscribe(&self) -> UpdateReceiver {
        UpdateReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active viewers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RobotBroadcast for BroadcastHub {
    fn publish(&self, robot: &Robot) {
        let update = RobotUpdate {
            robot: robot.clone(),
            published_at: Utc::now(),
        };
        // Err only means nobody is listening
        let _ = self.sender.send(update);
    }
}

/// Receiver for robot updates.
pub struct UpdateReceiver {
    receiver: broadcast::Receiver<RobotUpdate>,
}

impl UpdateReceiver {
    /// Receive the next update.
    ///
    /// Returns `None` if the hub has been dropped.
    /// Returns error description if the receiver lagged (missed updates).
    pub async fn recv(&mut self) -> Option<Result<RobotUpdate, String>> {
        match self.receiver.recv().await {
            Ok(update) => Some(Ok(update)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} updates", count)))
            },
        }
    }

    /// Try to receive an update without blocking.
    ///
    /// Returns `None` if no update is immediately available.
    pub fn try_recv(&mut self) -> Option<Result<RobotUpdate, String>> {
        match self.receiver.try_recv() {
            Ok(update) => Some(Ok(update)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} updates", count)))
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
