//! Event Store Repository
//!
//! Append-only persistence for the `auth_request` event stream. Sequence
//! numbers are allocated and the event row inserted inside the caller's
//! transaction, so this never opens its own transaction — the transaction
//! coordinator owns atomicity with the read model and outbox writes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::events::{AuthEvent, StoredEvent};

use super::error::is_unique_sequence_violation;
use super::EventStoreError;

const AGGREGATE_TYPE: &str = "auth_request";

/// Event Store for the `payment_events` table.
#[derive(Debug, Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    /// Create a new EventStore with a database pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pool handle, for callers (the transaction coordinator) that need to
    /// open the surrounding transaction themselves.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Allocate the next sequence number for an aggregate within `tx`.
    ///
    /// Reads `MAX(sequence_number)` for the aggregate and returns one past
    /// it (1 if no events exist yet). The actual uniqueness guarantee comes
    /// from `unique_aggregate_sequence`; a racing writer that computed the
    /// same number fails at insert time with [`EventStoreError::DuplicateSequence`].
    pub async fn next_sequence(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
    ) -> Result<i32, EventStoreError> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(sequence_number) FROM payment_events WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(max.unwrap_or(0) + 1)
    }

    /// Append an event at a pre-allocated sequence number within `tx`.
    ///
    /// Returns the generated `event_id`. Translates a unique-constraint
    /// violation on `(aggregate_id, sequence_number)` into a typed
    /// [`EventStoreError::DuplicateSequence`] for the caller to react to
    /// (the transaction coordinator does not retry this itself; the caller
    /// decides whether to recompute the sequence and retry the whole
    /// transaction).
    pub async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &AuthEvent,
        sequence_number: i32,
        metadata: &HashMap<String, String>,
    ) -> Result<Uuid, EventStoreError> {
        let event_id = Uuid::new_v4();
        let aggregate_id = event.aggregate_id();
        let event_type = event.event_type();
        let event_data = bincode::serialize(event)?;
        let metadata_json = serde_json::to_value(metadata).unwrap_or_else(|_| serde_json::json!({}));

        let result = sqlx::query(
            r#"
            INSERT INTO payment_events (
                event_id, aggregate_id, aggregate_type, event_type,
                event_data, metadata, sequence_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event_id)
        .bind(aggregate_id)
        .bind(AGGREGATE_TYPE)
        .bind(event_type)
        .bind(&event_data)
        .bind(metadata_json)
        .bind(sequence_number)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(event_id),
            Err(err) if is_unique_sequence_violation(&err) => {
                Err(EventStoreError::DuplicateSequence {
                    aggregate_id,
                    sequence_number,
                })
            }
            Err(err) => Err(EventStoreError::Database(err)),
        }
    }

    /// Whether an `AuthVoidRequested` event has been recorded for this
    /// aggregate, used by the worker to short-circuit processing of a
    /// request that was voided after intake.
    pub async fn has_void_event(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
    ) -> Result<bool, EventStoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM payment_events
                WHERE aggregate_id = $1 AND event_type = 'AuthVoidRequested'
            )
            "#,
        )
        .bind(aggregate_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(exists)
    }

    /// Fetch the full event history for an aggregate in sequence order.
    pub async fn get_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_id, aggregate_type, event_type,
                   event_data, sequence_number, created_at
            FROM payment_events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_data: Vec<u8> = row.try_get("event_data")?;
            let event: AuthEvent = bincode::deserialize(&event_data)?;
            events.push(StoredEvent {
                event_id: row.try_get("event_id")?,
                aggregate_type: row.try_get("aggregate_type")?,
                aggregate_id: row.try_get("aggregate_id")?,
                sequence_number: row.try_get("sequence_number")?,
                event_type: row.try_get("event_type")?,
                event,
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            });
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::AmountCents;

    #[test]
    fn test_event_store_error_is_concurrency_conflict() {
        let conflict = EventStoreError::DuplicateSequence {
            aggregate_id: Uuid::new_v4(),
            sequence_number: 2,
        };
        assert!(conflict.is_concurrency_conflict());

        let not_found = EventStoreError::AggregateNotFound(Uuid::new_v4());
        assert!(!not_found.is_concurrency_conflict());
    }

    #[test]
    fn test_event_bincode_roundtrip_via_store_types() {
        let event = AuthEvent::AuthRequestCreated {
            auth_request_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            payment_token: "tok_abc".to_string(),
            amount_cents: AmountCents::new(500).unwrap(),
            currency: "USD".to_string(),
            created_at: Utc::now(),
        };

        let encoded = bincode::serialize(&event).unwrap();
        let decoded: AuthEvent = bincode::deserialize(&encoded).unwrap();
        assert_eq!(event.event_type(), decoded.event_type());
    }
}
