//! Broadcast event bus.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::SlbEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Error returned by [`EventReceiver::recv_strict`] when the subscriber
/// fell behind and events were dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lagged(pub u64);

impl std::fmt::Display for Lagged {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber lagged, {} events dropped", self.0)
    }
}

impl std::error::Error for Lagged {}

/// Event bus broadcasting to all subscribers.
///
/// Each subscriber owns a bounded buffer of [`DEFAULT_CHANNEL_CAPACITY`]
/// events. Publishing never blocks; a subscriber that fills its buffer
/// loses the oldest events, which [`EventReceiver::recv_strict`] surfaces
/// so the daemon can apply its drop-slow policy.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<SlbEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the given per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that will see the event. Zero
    /// receivers is fine; events are hints and the store is the truth.
    pub fn publish(&self, event: SlbEvent) -> usize {
        let event = Arc::new(event);
        trace!(event_type = %event.event_type(), "publishing event");

        match self.sender.send(Arc::clone(&event)) {
            Ok(count) => {
                debug!(
                    event_type = %event.event_type(),
                    request_id = %event.request_id(),
                    receiver_count = count,
                    "event published"
                );
                count
            }
            Err(_) => {
                trace!(event_type = %event.event_type(), "no receivers for event");
                0
            }
        }
    }

    /// Subscribe to all events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Current number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Per-subscriber buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for events from the bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<SlbEvent>>,
}

impl EventReceiver {
    /// Receive the next event, skipping over any lag.
    ///
    /// Returns `None` when the bus is gone. Used by consumers that
    /// resynchronize from the store anyway (the polling watcher).
    pub async fn recv(&mut self) -> Option<Arc<SlbEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "event receiver lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next event, failing on lag.
    ///
    /// Returns `Ok(None)` when the bus is gone and `Err(Lagged)` when this
    /// subscriber fell behind. The daemon uses this to close slow
    /// subscriber connections instead of silently skipping events.
    pub async fn recv_strict(&mut self) -> Result<Option<Arc<SlbEvent>>, Lagged> {
        match self.receiver.recv().await {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::RecvError::Lagged(count)) => Err(Lagged(count)),
            Err(broadcast::error::RecvError::Closed) => Ok(None),
        }
    }

    /// Try to receive without blocking.
    pub fn try_recv(&mut self) -> Option<Arc<SlbEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "event receiver lagged, events dropped");
                }
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;
    use slb_core::{RequestId, RiskTier};

    fn pending() -> SlbEvent {
        SlbEvent::RequestPending {
            metadata: EventMetadata::new("test"),
            request_id: RequestId::new(),
            project_path: "/work/demo".to_string(),
            tier: RiskTier::Dangerous,
            command: "rm -rf ./build".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        let count = bus.publish(pending());
        assert_eq!(count, 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "request_pending");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut r1 = bus.subscribe();
        let mut r2 = bus.subscribe();

        assert_eq!(bus.publish(pending()), 2);
        assert!(r1.recv().await.is_some());
        assert!(r2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_no_subscribers_is_fine() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(pending()), 0);
    }

    #[tokio::test]
    async fn test_try_recv() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        assert!(receiver.try_recv().is_none());
        bus.publish(pending());
        assert!(receiver.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_recv_strict_reports_lag() {
        let bus = EventBus::with_capacity(2);
        let mut receiver = bus.subscribe();

        for _ in 0..5 {
            bus.publish(pending());
        }

        let err = receiver.recv_strict().await.unwrap_err();
        assert!(err.0 > 0);
    }

    #[tokio::test]
    async fn test_recv_skips_lag() {
        let bus = EventBus::with_capacity(2);
        let mut receiver = bus.subscribe();

        for _ in 0..5 {
            bus.publish(pending());
        }

        // Lag-tolerant receive still yields the retained events.
        assert!(receiver.recv().await.is_some());
    }
}
