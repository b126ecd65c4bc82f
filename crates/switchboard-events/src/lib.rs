//! Domain event broadcasting for the Switchboard platform.
//!
//! A single [`EventBroadcaster`] is created at server startup, lives in the
//! shared application state, and is handed by reference to whoever needs to
//! publish or subscribe. There is no global registry: dropping the
//! broadcaster (at shutdown) closes every subscriber stream.
//!
//! Delivery is at-most-once and fire-and-forget. Events go to whoever is
//! subscribed at publish time; nothing is persisted, acknowledged, or
//! replayed, and a subscriber that falls behind the channel capacity loses
//! the oldest events rather than stalling publishers.

use tokio::sync::broadcast;

use switchboard_types::DomainEvent;

/// Buffered events per subscriber before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Fan-out hub for [`DomainEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster whose subscribers each buffer up to `capacity`
    /// undelivered events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes one event to every current subscriber.
    ///
    /// Infallible by contract: with no subscribers the event is simply
    /// dropped, which is the normal state before any client connects.
    pub fn publish(&self, event: DomainEvent) {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(delivered) => {
                tracing::debug!(event_type, subscribers = delivered, "published domain event");
            }
            Err(_) => {
                tracing::debug!(event_type, "no subscribers for domain event, dropped");
            }
        }
    }

    /// Opens an independent subscription that sees every event published
    /// from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Number of currently connected subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
