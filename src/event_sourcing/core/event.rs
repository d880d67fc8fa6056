use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// ============================================================================
// Event Envelope - event metadata
// ============================================================================

/// Wraps a domain event with identity, ordering and causation metadata
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    pub event_type: String,
    pub event_version: i32,

    pub event_data: E,

    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,

    /// Who triggered this event
    pub user_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,

    pub metadata: HashMap<String, String>,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        aggregate_id: Uuid,
        sequence_number: i64,
        event_type: String,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type,
            event_version: 1,
            event_data,
            causation_id: None,
            correlation_id,
            user_id: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Events that can be persisted by an event store
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static {
    /// Stable name stored with each event row
    fn event_type(&self) -> &'static str;

    fn event_version(&self) -> i32 {
        1
    }
}

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(json: &str) -> Result<E, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug)]
    struct StockNoted {
        sku: String,
    }

    impl DomainEvent for StockNoted {
        fn event_type(&self) -> &'static str {
            "StockNoted"
        }
    }

    #[test]
    fn test_event_envelope_creation() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let event = StockNoted { sku: "MUG-01".to_string() };
        let envelope = EventEnvelope::new(
            aggregate_id,
            1,
            event.event_type().to_string(),
            event,
            correlation_id,
        )
        .with_user(user_id)
        .with_metadata("source", "checkout");

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "StockNoted");
        assert_eq!(envelope.user_id, Some(user_id));
        assert_eq!(envelope.metadata.get("source").map(String::as_str), Some("checkout"));
    }

    #[test]
    fn test_event_serialization() {
        let event = StockNoted { sku: "MUG-01".to_string() };

        let json = serialize_event(&event).unwrap();
        let deserialized: StockNoted = deserialize_event(&json).unwrap();

        assert_eq!(event.sku, deserialized.sku);
    }
}
