//! Idempotency Repository
//!
//! A thin `(idempotency_key, restaurant_id) -> auth_request_id` lookup
//! table (§4.2). A first-seen key inserts and the intake handler proceeds
//! to create a new request; a key seen again within its TTL returns the
//! original `auth_request_id` so the caller can poll that request's status
//! instead of creating a duplicate. Grounded on `check_idempotency` /
//! `write_idempotency_key` in `authorization_api/api/routes/authorize.py`.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Idempotency Repository Error
#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    /// A concurrent writer already bound this key (§4.6 step 2, "Commit").
    #[error("idempotency key already bound: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn is_idempotency_key_conflict(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.constraint() == Some("auth_idempotency_keys_pkey");
    }
    false
}

/// A stored idempotency binding.
#[derive(Debug, Clone)]
pub struct IdempotencyKey {
    pub idempotency_key: String,
    pub restaurant_id: Uuid,
    pub auth_request_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Repository for the `auth_idempotency_keys` table.
#[derive(Debug, Clone)]
pub struct IdempotencyRepository {
    pool: PgPool,
}

impl IdempotencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up an unexpired binding for `(idempotency_key, restaurant_id)`.
    pub async fn find(
        &self,
        idempotency_key: &str,
        restaurant_id: Uuid,
    ) -> Result<Option<IdempotencyKey>, IdempotencyError> {
        let row = sqlx::query_as::<_, IdempotencyKeyRow>(
            r#"
            SELECT idempotency_key, restaurant_id, auth_request_id, created_at, expires_at
            FROM auth_idempotency_keys
            WHERE idempotency_key = $1 AND restaurant_id = $2 AND expires_at > NOW()
            "#,
        )
        .bind(idempotency_key)
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Bind `idempotency_key` to `auth_request_id` within `tx`, as part of
    /// the same transaction that creates the request (§4.5 step 1). A
    /// concurrent insert of the same key races as a primary-key conflict;
    /// the caller handles that by re-querying via `find`.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        idempotency_key: &str,
        restaurant_id: Uuid,
        auth_request_id: Uuid,
        ttl_hours: i64,
    ) -> Result<(), IdempotencyError> {
        let result = sqlx::query(
            r#"
            INSERT INTO auth_idempotency_keys (idempotency_key, restaurant_id, auth_request_id, expires_at)
            VALUES ($1, $2, $3, NOW() + make_interval(hours => $4))
            "#,
        )
        .bind(idempotency_key)
        .bind(restaurant_id)
        .bind(auth_request_id)
        .bind(ttl_hours as f64)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_idempotency_key_conflict(&err) => {
                Err(IdempotencyError::Conflict(idempotency_key.to_string()))
            }
            Err(err) => Err(IdempotencyError::Database(err)),
        }
    }

    /// Delete expired bindings. Run periodically by the outbox dispatcher.
    pub async fn cleanup_expired(&self) -> Result<u64, IdempotencyError> {
        let result = sqlx::query("DELETE FROM auth_idempotency_keys WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct IdempotencyKeyRow {
    idempotency_key: String,
    restaurant_id: Uuid,
    auth_request_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<IdempotencyKeyRow> for IdempotencyKey {
    fn from(row: IdempotencyKeyRow) -> Self {
        Self {
            idempotency_key: row.idempotency_key,
            restaurant_id: row.restaurant_id,
            auth_request_id: row.auth_request_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}
