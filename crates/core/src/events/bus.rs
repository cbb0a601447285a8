//! In-process typed pub/sub
//!
//! Fan-out is best-effort: each subscriber has a bounded channel, and a
//! full buffer drops the event for that subscriber only. Persistence to the
//! event log happens before delivery; a log failure is logged and delivery
//! proceeds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{EntityType, EventStore, SystemEvent};

/// An event as delivered to subscribers
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: SystemEvent,
    pub occurred_at: DateTime<Utc>,
}

/// What a subscriber wants to see
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionFilter {
    All,
    EventType(String),
    Entity(EntityType, Uuid),
}

impl SubscriptionFilter {
    fn matches(&self, event: &SystemEvent) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::EventType(kind) => event.event_type() == kind,
            SubscriptionFilter::Entity(entity_type, entity_id) => {
                event.entity() == (*entity_type, *entity_id)
            }
        }
    }
}

struct SubscriberEntry {
    id: u64,
    filter: SubscriptionFilter,
    tx: mpsc::Sender<PublishedEvent>,
}

struct BusInner {
    closed: bool,
    subscribers: Vec<SubscriberEntry>,
}

/// Process-wide event bus
pub struct EventBus {
    inner: RwLock<BusInner>,
    log: Option<Arc<dyn EventStore>>,
    next_subscriber_id: AtomicU64,
}

/// Receiving end of a subscription. Dropping it (or calling
/// [`EventBus::unsubscribe`]) detaches the subscriber.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<PublishedEvent>,
}

impl Subscription {
    /// Receive the next matching event; `None` once the bus is closed or
    /// the subscription removed.
    pub async fn recv(&mut self) -> Option<PublishedEvent> {
        self.rx.recv().await
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl EventBus {
    /// A bus without a durable log (tests, tools)
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BusInner {
                closed: false,
                subscribers: Vec::new(),
            }),
            log: None,
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// A bus that appends every published event to the given log before
    /// fan-out
    pub fn with_log(log: Arc<dyn EventStore>) -> Self {
        Self {
            inner: RwLock::new(BusInner {
                closed: false,
                subscribers: Vec::new(),
            }),
            log: Some(log),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Publish an event to the log and all matching subscribers.
    ///
    /// Never blocks on slow subscribers and never fails: log errors are
    /// logged, full subscriber buffers drop the event for that subscriber.
    pub async fn publish(&self, event: SystemEvent) {
        let occurred_at = Utc::now();

        if let Some(log) = &self.log {
            if let Err(e) = log.append(&event, occurred_at).await {
                warn!(
                    event_type = event.event_type(),
                    error = %e,
                    "failed to persist event, delivering anyway"
                );
            }
        }

        let inner = self.inner.read().expect("bus lock poisoned");
        if inner.closed {
            debug!(event_type = event.event_type(), "bus closed, dropping publish");
            return;
        }

        let published = PublishedEvent { event, occurred_at };
        for sub in inner.subscribers.iter() {
            if !sub.filter.matches(&published.event) {
                continue;
            }
            match sub.tx.try_send(published.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscriber = sub.id,
                        event_type = published.event.event_type(),
                        "subscriber buffer full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Receiver side was dropped; entry is pruned on the
                    // next subscribe/unsubscribe.
                }
            }
        }
    }

    /// Subscribe to a single event type
    pub fn subscribe(&self, event_type: &str, buffer_size: usize) -> Subscription {
        self.add_subscriber(
            SubscriptionFilter::EventType(event_type.to_string()),
            buffer_size,
        )
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self, buffer_size: usize) -> Subscription {
        self.add_subscriber(SubscriptionFilter::All, buffer_size)
    }

    /// Subscribe to events about one entity
    pub fn subscribe_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
        buffer_size: usize,
    ) -> Subscription {
        self.add_subscriber(
            SubscriptionFilter::Entity(entity_type, entity_id),
            buffer_size,
        )
    }

    fn add_subscriber(&self, filter: SubscriptionFilter, buffer_size: usize) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let mut inner = self.inner.write().expect("bus lock poisoned");
        inner.subscribers.retain(|s| !s.tx.is_closed());
        if !inner.closed {
            inner.subscribers.push(SubscriberEntry { id, filter, tx });
        }
        Subscription { id, rx }
    }

    /// Remove a subscription, closing its channel
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut inner = self.inner.write().expect("bus lock poisoned");
        inner
            .subscribers
            .retain(|s| s.id != subscription.id && !s.tx.is_closed());
    }

    /// Close the bus: all subscriber channels are closed and subsequent
    /// publishes are no-ops.
    pub fn close(&self) {
        let mut inner = self.inner.write().expect("bus lock poisoned");
        inner.closed = true;
        inner.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.read().expect("bus lock poisoned").subscribers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::kinds;
    use tokio::time::{timeout, Duration};

    fn completed(download_id: Uuid) -> SystemEvent {
        SystemEvent::DownloadCompleted {
            download_id,
            source_path: "/downloads/x".to_string(),
        }
    }

    #[tokio::test]
    async fn filtered_subscriber_only_sees_its_type() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(kinds::DOWNLOAD_COMPLETED, 8);

        bus.publish(SystemEvent::CleanupCompleted {
            download_id: Uuid::new_v4(),
        })
        .await;
        let id = Uuid::new_v4();
        bus.publish(completed(id)).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        match received.event {
            SystemEvent::DownloadCompleted { download_id, .. } => assert_eq!(download_id, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn subscriber_sees_publish_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_all(16);

        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            bus.publish(completed(*id)).await;
        }

        for expected in &ids {
            let received = sub.recv().await.unwrap();
            match received.event {
                SystemEvent::DownloadCompleted { download_id, .. } => {
                    assert_eq!(download_id, *expected)
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn entity_filter() {
        let bus = EventBus::new();
        let id = Uuid::new_v4();
        let mut sub = bus.subscribe_entity(EntityType::Download, id, 8);

        bus.publish(completed(Uuid::new_v4())).await;
        bus.publish(completed(id)).await;

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event.entity(), (EntityType::Download, id));
    }

    #[tokio::test]
    async fn full_buffer_drops_for_that_subscriber_only() {
        let bus = EventBus::new();
        let mut tiny = bus.subscribe_all(1);
        let mut roomy = bus.subscribe_all(16);

        for _ in 0..3 {
            bus.publish(completed(Uuid::new_v4())).await;
        }

        // The tiny buffer kept only the first event
        assert!(timeout(Duration::from_millis(50), tiny.recv())
            .await
            .unwrap()
            .is_some());
        assert!(timeout(Duration::from_millis(50), tiny.recv())
            .await
            .is_err());

        // The roomy buffer kept all three
        for _ in 0..3 {
            assert!(timeout(Duration::from_millis(50), roomy.recv())
                .await
                .unwrap()
                .is_some());
        }
    }

    #[tokio::test]
    async fn close_ends_subscriptions_and_silences_publishes() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_all(8);
        bus.close();
        assert!(sub.recv().await.is_none());

        // No panic, no delivery
        bus.publish(completed(Uuid::new_v4())).await;
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_detaches() {
        let bus = EventBus::new();
        let sub = bus.subscribe_all(8);
        assert_eq!(bus.subscriber_count(), 1);
        bus.unsubscribe(&sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
