//! Read Model Repository
//!
//! `auth_request_state` is the denormalized current-state projection for
//! an authorization request. Every mutator here runs inside the caller's
//! transaction (the transaction coordinator owns atomicity with the event
//! store) and validates that the requested transition is legal for the
//! row's current status before issuing the `UPDATE`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::amount::AmountCents;

use super::error::ReadModelError;

/// Status values of the `auth_request_state` state machine (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthRequestStatus {
    Pending,
    Processing,
    Authorized,
    Denied,
    Failed,
    Voided,
    Expired,
}

impl AuthRequestStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Authorized => "AUTHORIZED",
            Self::Denied => "DENIED",
            Self::Failed => "FAILED",
            Self::Voided => "VOIDED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "AUTHORIZED" => Some(Self::Authorized),
            "DENIED" => Some(Self::Denied),
            "FAILED" => Some(Self::Failed),
            "VOIDED" => Some(Self::Voided),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Terminal states never transition further (§3, §4.7 invariants).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Authorized | Self::Denied | Self::Failed | Self::Voided | Self::Expired
        )
    }
}

impl std::fmt::Display for AuthRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Outcome fields written on a successful authorization.
#[derive(Debug, Clone)]
pub struct AuthorizedOutcome {
    pub processor_name: String,
    pub processor_auth_id: String,
    pub authorized_amount_cents: i64,
    pub authorization_code: String,
}

/// Outcome fields written on a decline.
#[derive(Debug, Clone)]
pub struct DeniedOutcome {
    pub processor_name: String,
    pub denial_code: String,
    pub denial_reason: String,
}

/// A snapshot of `auth_request_state`.
#[derive(Debug, Clone)]
pub struct StateRow {
    pub auth_request_id: Uuid,
    pub restaurant_id: Uuid,
    pub payment_token: String,
    pub status: AuthRequestStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub processor_auth_id: Option<String>,
    pub processor_name: Option<String>,
    pub authorized_amount_cents: Option<i64>,
    pub authorization_code: Option<String>,
    pub denial_code: Option<String>,
    pub denial_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub last_event_sequence: i32,
    pub last_event_id: Option<Uuid>,
}

/// A row of `restaurant_payment_configs`, read-only to this service.
#[derive(Debug, Clone)]
pub struct RestaurantPaymentConfig {
    pub restaurant_id: Uuid,
    pub processor_name: String,
    pub processor_config: serde_json::Value,
    pub is_active: bool,
}

fn row_to_state(row: sqlx::postgres::PgRow) -> Result<StateRow, ReadModelError> {
    let status_str: String = row.try_get("status")?;
    Ok(StateRow {
        auth_request_id: row.try_get("auth_request_id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        payment_token: row.try_get("payment_token")?,
        status: AuthRequestStatus::from_db_str(&status_str).unwrap_or(AuthRequestStatus::Pending),
        amount_cents: row.try_get("amount_cents")?,
        currency: row.try_get("currency")?,
        processor_auth_id: row.try_get("processor_auth_id")?,
        processor_name: row.try_get("processor_name")?,
        authorized_amount_cents: row.try_get("authorized_amount_cents")?,
        authorization_code: row.try_get("authorization_code")?,
        denial_code: row.try_get("denial_code")?,
        denial_reason: row.try_get("denial_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
        metadata: row.try_get("metadata")?,
        last_event_sequence: row.try_get("last_event_sequence")?,
        last_event_id: row.try_get("last_event_id")?,
    })
}

const STATE_COLUMNS: &str = r#"
    auth_request_id, restaurant_id, payment_token, status, amount_cents, currency,
    processor_auth_id, processor_name, authorized_amount_cents, authorization_code,
    denial_code, denial_reason, created_at, updated_at, completed_at, metadata,
    last_event_sequence, last_event_id
"#;

/// Repository for the `auth_request_state` / `restaurant_payment_configs`
/// tables.
#[derive(Debug, Clone)]
pub struct ReadModelStore {
    pool: sqlx::PgPool,
}

impl ReadModelStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Insert the initial PENDING row for a newly-accepted request.
    /// Grounded on `create_auth_request_state` (authorize.py).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_pending(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        restaurant_id: Uuid,
        payment_token: &str,
        amount_cents: AmountCents,
        currency: &str,
        metadata: &serde_json::Value,
        last_event_sequence: i32,
        last_event_id: Uuid,
    ) -> Result<(), ReadModelError> {
        sqlx::query(
            r#"
            INSERT INTO auth_request_state (
                auth_request_id, restaurant_id, payment_token, status,
                amount_cents, currency, metadata, last_event_sequence, last_event_id
            )
            VALUES ($1, $2, $3, 'PENDING', $4, $5, $6, $7, $8)
            "#,
        )
        .bind(auth_request_id)
        .bind(restaurant_id)
        .bind(payment_token)
        .bind(amount_cents.value())
        .bind(currency)
        .bind(metadata)
        .bind(last_event_sequence)
        .bind(last_event_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Load the current status and lock the row `FOR UPDATE`, failing if
    /// it isn't one of `allowed_from`. Shared by every transition mutator
    /// below so the legality check in §4.7 lives in exactly one place.
    async fn check_transition(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        allowed_from: &[AuthRequestStatus],
        to: AuthRequestStatus,
    ) -> Result<(), ReadModelError> {
        let current: Option<String> = sqlx::query_scalar(
            "SELECT status FROM auth_request_state WHERE auth_request_id = $1 FOR UPDATE",
        )
        .bind(auth_request_id)
        .fetch_optional(&mut **tx)
        .await?;

        let current = current.ok_or(ReadModelError::NotFound(auth_request_id))?;
        let current = AuthRequestStatus::from_db_str(&current).unwrap_or(AuthRequestStatus::Pending);

        if !allowed_from.contains(&current) {
            return Err(ReadModelError::InvalidStateTransition {
                auth_request_id,
                from: current.to_string(),
                to: to.to_string(),
            });
        }

        Ok(())
    }

    /// PENDING|PROCESSING -> PROCESSING (`AuthAttemptStarted`). Retries
    /// re-enter this from PROCESSING; see DESIGN.md open question 1.
    pub async fn update_to_processing(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        sequence: i32,
        event_id: Uuid,
    ) -> Result<(), ReadModelError> {
        self.check_transition(
            tx,
            auth_request_id,
            &[AuthRequestStatus::Pending, AuthRequestStatus::Processing],
            AuthRequestStatus::Processing,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE auth_request_state
            SET status = 'PROCESSING', last_event_sequence = $2, last_event_id = $3
            WHERE auth_request_id = $1
            "#,
        )
        .bind(auth_request_id)
        .bind(sequence)
        .bind(event_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// PROCESSING -> PROCESSING, advancing the sequence without changing
    /// status (a retryable `AuthAttemptFailed`).
    pub async fn update_retry_attempt(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        sequence: i32,
        event_id: Uuid,
    ) -> Result<(), ReadModelError> {
        self.check_transition(
            tx,
            auth_request_id,
            &[AuthRequestStatus::Processing],
            AuthRequestStatus::Processing,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE auth_request_state
            SET last_event_sequence = $2, last_event_id = $3
            WHERE auth_request_id = $1
            "#,
        )
        .bind(auth_request_id)
        .bind(sequence)
        .bind(event_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// PROCESSING -> AUTHORIZED (terminal).
    pub async fn update_to_authorized(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        sequence: i32,
        event_id: Uuid,
        outcome: &AuthorizedOutcome,
    ) -> Result<(), ReadModelError> {
        self.check_transition(
            tx,
            auth_request_id,
            &[AuthRequestStatus::Processing],
            AuthRequestStatus::Authorized,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE auth_request_state
            SET status = 'AUTHORIZED',
                completed_at = NOW(),
                last_event_sequence = $2,
                last_event_id = $3,
                processor_name = $4,
                processor_auth_id = $5,
                authorized_amount_cents = $6,
                authorization_code = $7
            WHERE auth_request_id = $1
            "#,
        )
        .bind(auth_request_id)
        .bind(sequence)
        .bind(event_id)
        .bind(&outcome.processor_name)
        .bind(&outcome.processor_auth_id)
        .bind(outcome.authorized_amount_cents)
        .bind(&outcome.authorization_code)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// PROCESSING -> DENIED (terminal). A decline is not a failure.
    pub async fn update_to_denied(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        sequence: i32,
        event_id: Uuid,
        outcome: &DeniedOutcome,
    ) -> Result<(), ReadModelError> {
        self.check_transition(
            tx,
            auth_request_id,
            &[AuthRequestStatus::Processing],
            AuthRequestStatus::Denied,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE auth_request_state
            SET status = 'DENIED',
                completed_at = NOW(),
                last_event_sequence = $2,
                last_event_id = $3,
                processor_name = $4,
                denial_code = $5,
                denial_reason = $6
            WHERE auth_request_id = $1
            "#,
        )
        .bind(auth_request_id)
        .bind(sequence)
        .bind(event_id)
        .bind(&outcome.processor_name)
        .bind(&outcome.denial_code)
        .bind(&outcome.denial_reason)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// PROCESSING -> FAILED (terminal, non-retryable or max-retries-exceeded).
    pub async fn update_to_failed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        sequence: i32,
        event_id: Uuid,
    ) -> Result<(), ReadModelError> {
        self.check_transition(
            tx,
            auth_request_id,
            &[AuthRequestStatus::Processing],
            AuthRequestStatus::Failed,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE auth_request_state
            SET status = 'FAILED', completed_at = NOW(), last_event_sequence = $2, last_event_id = $3
            WHERE auth_request_id = $1
            "#,
        )
        .bind(auth_request_id)
        .bind(sequence)
        .bind(event_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// {PENDING,PROCESSING} -> EXPIRED (terminal; void race, §4.7 step 2).
    pub async fn update_to_expired(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        auth_request_id: Uuid,
        sequence: i32,
        event_id: Uuid,
    ) -> Result<(), ReadModelError> {
        self.check_transition(
            tx,
            auth_request_id,
            &[AuthRequestStatus::Pending, AuthRequestStatus::Processing],
            AuthRequestStatus::Expired,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE auth_request_state
            SET status = 'EXPIRED', completed_at = NOW(), last_event_sequence = $2, last_event_id = $3
            WHERE auth_request_id = $1
            "#,
        )
        .bind(auth_request_id)
        .bind(sequence)
        .bind(event_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Fetch the current state row, if any.
    pub async fn get(&self, auth_request_id: Uuid) -> Result<Option<StateRow>, ReadModelError> {
        let row = sqlx::query(&format!(
            "SELECT {STATE_COLUMNS} FROM auth_request_state WHERE auth_request_id = $1"
        ))
        .bind(auth_request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_state).transpose()
    }

    /// Fetch a restaurant's active payment processor configuration.
    pub async fn get_config(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Option<RestaurantPaymentConfig>, ReadModelError> {
        let row = sqlx::query(
            r#"
            SELECT restaurant_id, processor_name, processor_config, is_active
            FROM restaurant_payment_configs
            WHERE restaurant_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(RestaurantPaymentConfig {
                restaurant_id: r.try_get("restaurant_id")?,
                processor_name: r.try_get("processor_name")?,
                processor_config: r.try_get("processor_config")?,
                is_active: r.try_get("is_active")?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            AuthRequestStatus::Pending,
            AuthRequestStatus::Processing,
            AuthRequestStatus::Authorized,
            AuthRequestStatus::Denied,
            AuthRequestStatus::Failed,
            AuthRequestStatus::Voided,
            AuthRequestStatus::Expired,
        ] {
            let s = status.as_db_str();
            assert_eq!(AuthRequestStatus::from_db_str(s), Some(status));
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AuthRequestStatus::Pending.is_terminal());
        assert!(!AuthRequestStatus::Processing.is_terminal());
        assert!(AuthRequestStatus::Authorized.is_terminal());
        assert!(AuthRequestStatus::Denied.is_terminal());
        assert!(AuthRequestStatus::Failed.is_terminal());
        assert!(AuthRequestStatus::Voided.is_terminal());
        assert!(AuthRequestStatus::Expired.is_terminal());
    }

    #[test]
    fn test_unknown_status_string_rejected() {
        assert_eq!(AuthRequestStatus::from_db_str("BOGUS"), None);
    }
}
