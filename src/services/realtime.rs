//! Fan-out of row-level change events to connected viewers.

use crate::models::ChangeEvent;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Broadcaster {
    /// `capacity` bounds how far a slow subscriber may fall behind before
    /// it is told to resync.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        tracing::info!("Realtime broadcaster initialized with capacity {}", capacity);
        Self { tx }
    }

    /// Sends to every subscriber and returns how many received it.
    /// Publishing with nobody listening is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => {
                tracing::debug!("Broadcast change to {} subscribers", count);
                count
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
