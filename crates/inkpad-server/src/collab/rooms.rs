use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::protocol::ServerEvent;

/// Identifies one socket connection
pub type ConnectionId = Uuid;

/// A relayed event tagged with the connection that sent it
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: ConnectionId,
    pub event: ServerEvent,
}

/// Broadcast groups keyed by notebook id.
///
/// Delivery is best effort: a receiver that falls more than `capacity`
/// events behind loses the oldest ones.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<Uuid, broadcast::Sender<Envelope>>>,
    capacity: usize,
}

impl RoomRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe a connection to a notebook's room, creating it if needed
    pub async fn join(&self, notebook_id: Uuid, me: ConnectionId) -> RoomSubscription {
        // First try to get existing
        {
            let rooms = self.rooms.read().await;
            if let Some(tx) = rooms.get(&notebook_id) {
                return RoomSubscription::new(notebook_id, me, tx.subscribe());
            }
        }

        let mut rooms = self.rooms.write().await;
        // Double-check after acquiring write lock
        let tx = rooms
            .entry(notebook_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        RoomSubscription::new(notebook_id, me, tx.subscribe())
    }

    /// Send to every subscriber of the room; returns how many were reached.
    ///
    /// The origin's own subscription filters the event out on receipt.
    pub async fn publish(
        &self,
        notebook_id: Uuid,
        origin: ConnectionId,
        event: ServerEvent,
    ) -> usize {
        let rooms = self.rooms.read().await;
        match rooms.get(&notebook_id) {
            // Ignore errors if no receivers
            Some(tx) => tx.send(Envelope { origin, event }).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop the room once nobody is subscribed
    pub async fn release(&self, notebook_id: Uuid) {
        let mut rooms = self.rooms.write().await;
        if rooms
            .get(&notebook_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            rooms.remove(&notebook_id);
            tracing::debug!(notebook_id = %notebook_id, "room closed");
        }
    }

    /// Get room count
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn member_count(&self, notebook_id: Uuid) -> usize {
        self.rooms
            .read()
            .await
            .get(&notebook_id)
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(256)
    }
}

/// One connection's view of a room, skipping its own events
pub struct RoomSubscription {
    notebook_id: Uuid,
    me: ConnectionId,
    rx: broadcast::Receiver<Envelope>,
}

impl RoomSubscription {
    fn new(notebook_id: Uuid, me: ConnectionId, rx: broadcast::Receiver<Envelope>) -> Self {
        Self { notebook_id, me, rx }
    }

    /// Next event from another member; `None` once the room is gone
    pub async fn next(&mut self) -> Option<ServerEvent> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.origin == self.me => continue,
                Ok(envelope) => return Some(envelope.event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        notebook_id = %self.notebook_id,
                        skipped,
                        "relay subscriber lagged, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
