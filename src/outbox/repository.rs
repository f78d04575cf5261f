//! Outbox Repository
//!
//! At-least-once relay of intake-time facts to the FIFO queue. A row is
//! appended in the same transaction as its triggering event (see
//! `crate::transaction`); the dispatcher polls for unprocessed rows and
//! marks each processed only after the enqueue call succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::error::OutboxError;

/// Payload carried for an `auth_request_queued` outbox message, the only
/// message type this dispatcher currently produces (§4.3, §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequestQueuedPayload {
    pub auth_request_id: Uuid,
    pub restaurant_id: Uuid,
    pub created_at: DateTime<Utc>,
}

pub const MESSAGE_TYPE_AUTH_REQUEST_QUEUED: &str = "auth_request_queued";

/// A row of the `outbox` table, payload already decoded.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: i64,
    pub aggregate_id: Uuid,
    pub message_type: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// Decode `payload` as an `AuthRequestQueuedPayload`, the only shape
    /// this dispatcher knows how to produce or consume today.
    pub fn decode_auth_request_queued(&self) -> Result<AuthRequestQueuedPayload, OutboxError> {
        Ok(bincode::deserialize(&self.payload)?)
    }
}

fn row_to_entry(row: sqlx::postgres::PgRow) -> Result<OutboxEntry, OutboxError> {
    Ok(OutboxEntry {
        id: row.try_get("id")?,
        aggregate_id: row.try_get("aggregate_id")?,
        message_type: row.try_get("message_type")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

/// Repository for the `outbox` table.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: PgPool,
}

impl OutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an `auth_request_queued` row within `tx`.
    pub async fn append_auth_request_queued(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        restaurant_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<i64, OutboxError> {
        let payload = AuthRequestQueuedPayload {
            auth_request_id,
            restaurant_id,
            created_at,
        };
        let encoded = bincode::serialize(&payload)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO outbox (aggregate_id, message_type, payload)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(auth_request_id)
        .bind(MESSAGE_TYPE_AUTH_REQUEST_QUEUED)
        .bind(&encoded)
        .fetch_one(&mut **tx)
        .await?;

        Ok(id)
    }

    /// Oldest-first unprocessed rows, up to `limit`. Not row-locking: two
    /// dispatcher replicas may both claim and enqueue the same row (§4.10,
    /// DESIGN.md open question 3). Downstream dedup absorbs the duplicate.
    pub async fn claim_unprocessed(&self, limit: i64) -> Result<Vec<OutboxEntry>, OutboxError> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, message_type, payload, created_at, processed_at
            FROM outbox
            WHERE processed_at IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_entry).collect()
    }

    /// Mark a row processed after a confirmed enqueue.
    pub async fn mark_processed(&self, id: i64) -> Result<(), OutboxError> {
        sqlx::query("UPDATE outbox SET processed_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_bincode_roundtrip() {
        let payload = AuthRequestQueuedPayload {
            auth_request_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        let encoded = bincode::serialize(&payload).unwrap();
        let entry = OutboxEntry {
            id: 1,
            aggregate_id: payload.auth_request_id,
            message_type: MESSAGE_TYPE_AUTH_REQUEST_QUEUED.to_string(),
            payload: encoded,
            created_at: payload.created_at,
            processed_at: None,
        };

        let decoded = entry.decode_auth_request_queued().unwrap();
        assert_eq!(decoded.auth_request_id, payload.auth_request_id);
        assert_eq!(decoded.restaurant_id, payload.restaurant_id);
    }
}
