//! Graceful shutdown fan-out.
//!
//! # Responsibilities
//! - Hand out shutdown receivers to the server loop and the health checker
//! - Broadcast a single stop notice when a termination signal arrives
//!
//! # Design Decisions
//! - A `broadcast` channel of capacity one: the notice carries no data and
//!   is only ever sent once
//! - Cloning shares the sender, so the signal task can own its own handle

use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every current subscriber. A trigger with no subscribers is a
    /// no-op.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
