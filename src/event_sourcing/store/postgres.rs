use std::marker::PhantomData;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::event_sourcing::core::{deserialize_event, serialize_event, DomainEvent, EventEnvelope};
use crate::storage::StoreError;
use super::event_store::EventStore;

// ============================================================================
// PostgreSQL Event Store
// ============================================================================
//
// One row per event in `event_store`, plus a per-aggregate row in
// `aggregate_sequence` that is locked (`FOR UPDATE`) during an append so the
// version check and the inserts happen in one transaction.
//
// ============================================================================

pub const EVENT_STORE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS event_store (
        aggregate_id UUID NOT NULL,
        sequence_number BIGINT NOT NULL,
        event_id UUID NOT NULL UNIQUE,
        aggregate_type TEXT NOT NULL,
        event_type TEXT NOT NULL,
        event_version INT NOT NULL,
        event_data TEXT NOT NULL,
        causation_id UUID,
        correlation_id UUID NOT NULL,
        user_id UUID,
        timestamp TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (aggregate_id, sequence_number)
    )",
    "CREATE TABLE IF NOT EXISTS aggregate_sequence (
        aggregate_id UUID PRIMARY KEY,
        aggregate_type TEXT NOT NULL,
        current_sequence BIGINT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
];

pub struct PostgresEventStore<E: DomainEvent> {
    pool: PgPool,
    aggregate_type_name: String,
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> PostgresEventStore<E> {
    pub fn new(pool: PgPool, aggregate_type_name: &str) -> Self {
        Self {
            pool,
            aggregate_type_name: aggregate_type_name.to_string(),
            _phantom: PhantomData,
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in EVENT_STORE_SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<E: DomainEvent> EventStore<E> for PostgresEventStore<E> {
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
    ) -> Result<i64, StoreError> {
        if events.is_empty() {
            return Err(StoreError::Corrupt("cannot append empty event list".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        if expected_version == 0 {
            sqlx::query(
                "INSERT INTO aggregate_sequence (aggregate_id, aggregate_type, current_sequence, updated_at)
                 VALUES ($1, $2, 0, now())
                 ON CONFLICT (aggregate_id) DO NOTHING",
            )
            .bind(aggregate_id)
            .bind(&self.aggregate_type_name)
            .execute(&mut *tx)
            .await?;
        }

        let current_version: i64 = sqlx::query(
            "SELECT current_sequence FROM aggregate_sequence WHERE aggregate_id = $1 FOR UPDATE",
        )
        .bind(aggregate_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get("current_sequence"))
        .transpose()?
        .unwrap_or(0);

        if current_version != expected_version {
            tx.rollback().await?;
            return Err(StoreError::VersionConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let event_count = events.len();
        let mut new_version = expected_version;

        for envelope in &events {
            new_version += 1;
            let event_json = serialize_event(&envelope.event_data)?;

            sqlx::query(
                "INSERT INTO event_store (
                    aggregate_id, sequence_number, event_id, aggregate_type, event_type,
                    event_version, event_data, causation_id, correlation_id, user_id, timestamp
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(aggregate_id)
            .bind(new_version)
            .bind(envelope.event_id)
            .bind(&self.aggregate_type_name)
            .bind(&envelope.event_type)
            .bind(envelope.event_version)
            .bind(event_json)
            .bind(envelope.causation_id)
            .bind(envelope.correlation_id)
            .bind(envelope.user_id)
            .bind(envelope.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE aggregate_sequence SET current_sequence = $2, updated_at = now() WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .bind(new_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type_name,
            new_version = new_version,
            event_count = event_count,
            "Appended events to event store"
        );

        Ok(new_version)
    }

    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<EventEnvelope<E>>, StoreError> {
        let rows = sqlx::query(
            "SELECT sequence_number, event_id, event_type, event_version, event_data,
                    causation_id, correlation_id, user_id, timestamp
             FROM event_store
             WHERE aggregate_id = $1
             ORDER BY sequence_number ASC",
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());

        for row in rows {
            let event_json: String = row.try_get("event_data")?;
            let timestamp: DateTime<Utc> = row.try_get("timestamp")?;

            events.push(EventEnvelope {
                event_id: row.try_get("event_id")?,
                aggregate_id,
                sequence_number: row.try_get("sequence_number")?,
                event_type: row.try_get("event_type")?,
                event_version: row.try_get("event_version")?,
                event_data: deserialize_event(&event_json)?,
                causation_id: row.try_get("causation_id")?,
                correlation_id: row.try_get("correlation_id")?,
                user_id: row.try_get("user_id")?,
                timestamp,
                metadata: std::collections::HashMap::new(),
            });
        }

        tracing::debug!(aggregate_id = %aggregate_id, count = events.len(), "Loaded events");
        Ok(events)
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT current_sequence FROM aggregate_sequence WHERE aggregate_id = $1")
            .bind(aggregate_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("current_sequence")?),
            None => Ok(0),
        }
    }

    async fn aggregate_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let rows = sqlx::query(
            "SELECT aggregate_id FROM aggregate_sequence
             WHERE aggregate_type = $1 AND current_sequence > 0
             ORDER BY aggregate_id",
        )
        .bind(&self.aggregate_type_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("aggregate_id").map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_stream_key() {
        let event_table = EVENT_STORE_SCHEMA[0];
        assert!(event_table.contains("PRIMARY KEY (aggregate_id, sequence_number)"));
        assert!(EVENT_STORE_SCHEMA[1].contains("current_sequence BIGINT"));
    }

    // Appends, version conflicts and reloads against a live PostgreSQL are
    // covered by the in-memory store's tests at the contract level.
}
