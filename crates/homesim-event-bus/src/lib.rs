//! Change-record fan-out for homesim
//!
//! The EventBus delivers every published ChangeRecord to all currently
//! registered subscribers. Each subscriber has its own bounded queue; a
//! subscriber whose queue overflows is disconnected and reported, so a slow
//! consumer can never stall the simulation. Delivery is at-least-once and
//! in sequence order per entity (the entity store publishes while holding
//! the entity's lock).

use dashmap::DashMap;
use homesim_core::ChangeRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Default queue capacity for a subscriber
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A unique identifier for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Fan-out bus for change records
pub struct EventBus {
    /// Active subscriber queues
    subscribers: DashMap<SubscriberId, mpsc::Sender<ChangeRecord>>,
    /// Counter for generating unique subscriber IDs
    next_subscriber_id: AtomicU64,
    /// Total records published
    published: AtomicU64,
    /// Subscribers disconnected due to queue overflow
    overflows: AtomicU64,
    /// Default queue capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the default queue capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a new event bus with the given default queue capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_subscriber_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            overflows: AtomicU64::new(0),
            capacity,
        }
    }

    /// Register a new subscriber with the default queue capacity
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<ChangeRecord>) {
        self.subscribe_with_capacity(self.capacity)
    }

    /// Register a new subscriber with an explicit queue capacity
    pub fn subscribe_with_capacity(
        &self,
        capacity: usize,
    ) -> (SubscriberId, mpsc::Receiver<ChangeRecord>) {
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.insert(id, tx);
        trace!(subscriber = id.0, "Subscriber registered");
        (id, rx)
    }

    /// Remove a subscriber, releasing its queue
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Publish a change record to all subscribers
    ///
    /// Delivery never blocks. A subscriber whose queue is full (or whose
    /// receiver was dropped) is disconnected; other subscribers are
    /// unaffected.
    pub fn publish(&self, record: &ChangeRecord) {
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut disconnected: Vec<(SubscriberId, bool)> = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(record.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    disconnected.push((*entry.key(), true));
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    disconnected.push((*entry.key(), false));
                }
            }
        }

        for (id, overflow) in disconnected {
            self.subscribers.remove(&id);
            if overflow {
                self.overflows.fetch_add(1, Ordering::Relaxed);
                warn!(subscriber = id.0, "Subscriber queue overflow, disconnecting");
            } else {
                trace!(subscriber = id.0, "Subscriber receiver dropped, removing");
            }
        }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total records published since creation
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of subscribers disconnected due to overflow
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Drop all subscriber queues (used at simulator shutdown)
    pub fn clear(&self) {
        self.subscribers.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use homesim_core::EntityId;
    use std::collections::HashMap;

    fn record(seq: u64) -> ChangeRecord {
        ChangeRecord {
            entity_id: "light.kitchen".parse::<EntityId>().unwrap(),
            home_id: "home_001".to_string(),
            old_state: Some("off".to_string()),
            new_state: "on".to_string(),
            attribute_delta: HashMap::new(),
            timestamp: Utc::now(),
            sequence: seq,
        }
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe();

        bus.publish(&record(1));
        bus.publish(&record(2));

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        assert_eq!(rx.recv().await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let (_a, mut rx_a) = bus.subscribe();
        let (_b, mut rx_b) = bus.subscribe();

        bus.publish(&record(7));

        assert_eq!(rx_a.recv().await.unwrap().sequence, 7);
        assert_eq!(rx_b.recv().await.unwrap().sequence, 7);
    }

    #[tokio::test]
    async fn test_overflow_disconnects_only_offender() {
        let bus = EventBus::new();
        let (slow, _slow_rx) = bus.subscribe_with_capacity(2);
        let (_fast, mut fast_rx) = bus.subscribe_with_capacity(16);

        for seq in 0..5 {
            bus.publish(&record(seq));
        }

        // The slow subscriber overflowed after 2 records and was removed
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.overflow_count(), 1);
        assert!(!bus.unsubscribe(slow));

        // The fast subscriber received everything
        for seq in 0..5 {
            assert_eq!(fast_rx.recv().await.unwrap().sequence, seq);
        }
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let (_id, rx) = bus.subscribe();
        drop(rx);

        bus.publish(&record(1));
        assert_eq!(bus.subscriber_count(), 0);
        // Dropped receivers are not counted as overflows
        assert_eq!(bus.overflow_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBus::new();
        let (id, _rx) = bus.subscribe();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
