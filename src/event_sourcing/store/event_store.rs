use std::collections::HashMap;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_sourcing::core::{Aggregate, DomainEvent, EventEnvelope};
use crate::storage::StoreError;

// ============================================================================
// Event Store - append-only event streams per aggregate
// ============================================================================
//
// Responsibilities:
// 1. Append events to an aggregate's stream (append-only)
// 2. Load the full stream in sequence order
// 3. Optimistic concurrency: an append succeeds only if the stream is still
//    at `expected_version`
//
// ============================================================================

#[async_trait]
pub trait EventStore<E: DomainEvent>: Send + Sync {
    /// Append events after `expected_version`; returns the new version.
    ///
    /// Sequence numbers are assigned here, consecutively from
    /// `expected_version + 1`.
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError>;

    /// Load all events for an aggregate in sequence order
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError>;

    /// Current version (0 for an unknown aggregate)
    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError>;

    /// Every aggregate with at least one event
    async fn aggregate_ids(&self) -> Result<Vec<Uuid>, StoreError>;
}

/// Rebuild an aggregate from its stream; `Ok(None)` if it has no events
pub async fn load_aggregate<A, E>(
    store: &dyn EventStore<E>,
    aggregate_id: Uuid,
) -> Result<Option<A>, A::Error>
where
    E: DomainEvent,
    A: Aggregate<Event = E>,
    A::Error: From<StoreError>,
{
    let events = store.load_events(aggregate_id).await?;
    A::load_from_events(aggregate_id, events)
}

// ============================================================================
// In-Memory Event Store
// ============================================================================

pub struct InMemoryEventStore<E> {
    streams: RwLock<HashMap<Uuid, Vec<EventEnvelope<E>>>>,
}

impl<E> InMemoryEventStore<E> {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: DomainEvent> EventStore<E> for InMemoryEventStore<E> {
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError> {
        if events.is_empty() {
            return Err(StoreError::Corrupt("cannot append empty event list".to_string()));
        }

        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id).or_default();

        let current_version = stream.last().map(|e| e.sequence_number).unwrap_or(0);
        if current_version != expected_version {
            return Err(StoreError::VersionConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let event_count = events.len();
        let mut new_version = expected_version;
        for mut envelope in events {
            new_version += 1;
            envelope.sequence_number = new_version;
            stream.push(envelope);
        }

        tracing::debug!(
            aggregate_id = %aggregate_id,
            new_version = new_version,
            event_count = event_count,
            "Appended events to in-memory store"
        );

        Ok(new_version)
    }

    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        let streams = self.streams.read().await;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(&aggregate_id)
            .and_then(|s| s.last())
            .map(|e| e.sequence_number)
            .unwrap_or(0))
    }

    async fn aggregate_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let streams = self.streams.read().await;
        Ok(streams
            .iter()
            .filter(|(_, stream)| !stream.is_empty())
            .map(|(id, _)| *id)
            .collect())
    }
}
