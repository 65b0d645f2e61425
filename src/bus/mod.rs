//! Notification bus.
//!
//! Broadcast channel carrying newly detected asset addresses on the
//! "new_token" topic. Delivery is at-least-once from the subscriber's
//! point of view (a restarted evaluator re-drains recent assets), so
//! every consumer must go through the durable processed marker.

use tokio::sync::broadcast;
use tracing::debug;

/// Topic name, kept for log readability.
pub const TOPIC_NEW_TOKEN: &str = "new_token";

/// Default channel capacity. A lagging subscriber drops the oldest
/// messages and logs; it never blocks the poller.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<String>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Announce a new asset. A send with no live subscribers is not an
    /// error; the startup drain covers assets published before the
    /// evaluator subscribed.
    pub fn publish(&self, address: &str) {
        match self.tx.send(address.to_string()) {
            Ok(receivers) => {
                debug!(topic = TOPIC_NEW_TOKEN, address, receivers, "Published");
            }
            Err(_) => {
                debug!(topic = TOPIC_NEW_TOKEN, address, "No subscribers");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = NotificationBus::new();
        let mut rx = bus.subscribe();
        bus.publish("mintA");
        assert_eq!(rx.recv().await.unwrap(), "mintA");
    }

    #[tokio::test]
    async fn test_publish_fans_out() {
        let bus = NotificationBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.publish("mintA");
        assert_eq!(rx1.recv().await.unwrap(), "mintA");
        assert_eq!(rx2.recv().await.unwrap(), "mintA");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let bus = NotificationBus::new();
        bus.publish("mintA"); // must not panic or error
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_messages() {
        let bus = NotificationBus::new();
        bus.publish("early");
        let mut rx = bus.subscribe();
        bus.publish("late");
        assert_eq!(rx.recv().await.unwrap(), "late");
    }
}
