//! In-process event bus.

use tokio::sync::broadcast;

use cloudbox_core::events::{ClientEvent, EventPayload};

/// Broadcasts [`ClientEvent`]s to every subscriber.
///
/// Publishing never blocks; a subscriber that falls behind by more than
/// the buffer size loses the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Broadcast sender shared by all publishers.
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer.
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn publish(&self, payload: impl Into<EventPayload>) {
        let _ = self.tx.send(ClientEvent::new(payload.into()));
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
