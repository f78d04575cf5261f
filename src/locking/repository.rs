//! Distributed Lock Repository
//!
//! A single-row-per-aggregate CAS lock over `auth_processing_locks`.
//! `try_acquire` performs the insert-or-steal-if-expired check in one
//! round trip; `release` is a conditional delete so a worker can never
//! release a lock it does not hold.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::LockingError;

#[derive(Debug, Clone)]
pub struct DistributedLock {
    pool: PgPool,
}

impl DistributedLock {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attempt to acquire the lock for `aggregate_id`. Succeeds if no row
    /// exists, or if the existing row has expired (stolen in that case).
    /// Returns `Ok(true)` on acquisition, `Ok(false)` if another worker
    /// currently holds an unexpired lock.
    pub async fn try_acquire(
        &self,
        aggregate_id: Uuid,
        worker_id: &str,
        ttl_seconds: i64,
    ) -> Result<bool, LockingError> {
        let result = sqlx::query(
            r#"
            INSERT INTO auth_processing_locks (auth_request_id, worker_id, locked_at, expires_at)
            VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3))
            ON CONFLICT (auth_request_id) DO UPDATE
                SET worker_id = EXCLUDED.worker_id,
                    locked_at = EXCLUDED.locked_at,
                    expires_at = EXCLUDED.expires_at
            WHERE auth_processing_locks.expires_at < NOW()
            "#,
        )
        .bind(aggregate_id)
        .bind(worker_id)
        .bind(ttl_seconds as f64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Release the lock, but only if `worker_id` still holds it. A
    /// missing or mismatched row is a no-op, not an error (§4.4).
    pub async fn release(&self, aggregate_id: Uuid, worker_id: &str) -> Result<bool, LockingError> {
        let result = sqlx::query(
            "DELETE FROM auth_processing_locks WHERE auth_request_id = $1 AND worker_id = $2",
        )
        .bind(aggregate_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Sweep expired rows. Not required for correctness (`try_acquire`
    /// already steals expired locks) but keeps the table bounded.
    pub async fn cleanup_expired(&self) -> Result<u64, LockingError> {
        let result = sqlx::query("DELETE FROM auth_processing_locks WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Current lock holder and expiry, for diagnostics and tests.
    pub async fn peek(&self, aggregate_id: Uuid) -> Result<Option<LockRow>, LockingError> {
        let row = sqlx::query_as::<_, LockRow>(
            "SELECT auth_request_id, worker_id, locked_at, expires_at FROM auth_processing_locks WHERE auth_request_id = $1",
        )
        .bind(aggregate_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockRow {
    pub auth_request_id: Uuid,
    pub worker_id: String,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
