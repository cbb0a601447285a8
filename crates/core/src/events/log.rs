//! Durable append-only event log

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityType, SystemEvent};
use crate::Result;

/// A persisted event row. Ids are monotonically increasing in append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub event_type: String,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub payload: serde_json::Value,
    /// When the event happened, as reported by the publisher
    pub occurred_at: DateTime<Utc>,
    /// When the row was written
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Rehydrate the typed event via the registry
    pub fn to_event(&self) -> Result<SystemEvent> {
        SystemEvent::from_stored(&self.event_type, self.payload.clone())
    }
}

/// Storage contract for the event log. Each published event is appended
/// exactly once per publish call; failures are the caller's to log, never
/// to propagate into the delivery path.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event, returning the assigned monotonic id
    async fn append(&self, event: &SystemEvent, occurred_at: DateTime<Utc>) -> Result<i64>;

    /// Events with `occurred_at >= since`, oldest first
    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<StoredEvent>>;

    /// Events about one entity, oldest first
    async fn for_entity(&self, entity_type: EntityType, entity_id: Uuid)
        -> Result<Vec<StoredEvent>>;

    /// The last `n` events, newest first
    async fn recent(&self, n: u32) -> Result<Vec<StoredEvent>>;

    /// Delete events older than the given time, returning the count removed
    async fn prune(&self, older_than: DateTime<Utc>) -> Result<u64>;
}
