//! Transaction Coordinator
//!
//! Every worker-path state transition composes an event-store append with
//! a read-model mutation inside one database transaction (§4.5): either
//! both become visible or neither does. This is the only place in the
//! crate allowed to open a transaction spanning those two tables.

mod error;

pub use error::TransactionError;

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::events::{AuthEvent, ResponseOutcome};
use crate::event_store::EventStore;
use crate::read_model::{AuthorizedOutcome, DeniedOutcome, ReadModelStore};

#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    event_store: EventStore,
    read_model: ReadModelStore,
}

impl TransactionCoordinator {
    pub fn new(event_store: EventStore, read_model: ReadModelStore) -> Self {
        Self {
            event_store,
            read_model,
        }
    }

    /// PENDING|PROCESSING -> PROCESSING, appending `AuthAttemptStarted`.
    pub async fn record_started(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        attempt_number: i32,
        metadata: &HashMap<String, String>,
    ) -> Result<i32, TransactionError> {
        let mut tx = self.event_store.pool().begin().await?;

        let sequence = self.event_store.next_sequence(&mut tx, auth_request_id).await?;
        let event = AuthEvent::AuthAttemptStarted {
            auth_request_id,
            worker_id: worker_id.to_string(),
            attempt_number,
            started_at: Utc::now(),
        };
        let event_id = self.event_store.append(&mut tx, &event, sequence, metadata).await?;
        self.read_model
            .update_to_processing(&mut tx, auth_request_id, sequence, event_id)
            .await?;

        tx.commit().await?;

        Ok(sequence)
    }

    /// PROCESSING -> AUTHORIZED, appending `AuthResponseReceived`.
    pub async fn record_authorized(
        &self,
        auth_request_id: Uuid,
        outcome: &AuthorizedOutcome,
        metadata: &HashMap<String, String>,
    ) -> Result<i32, TransactionError> {
        let mut tx = self.event_store.pool().begin().await?;

        let sequence = self.event_store.next_sequence(&mut tx, auth_request_id).await?;
        let event = AuthEvent::AuthResponseReceived {
            auth_request_id,
            outcome: ResponseOutcome::Authorized,
            processor_name: outcome.processor_name.clone(),
            processor_auth_id: Some(outcome.processor_auth_id.clone()),
            authorized_amount_cents: Some(outcome.authorized_amount_cents),
            authorization_code: Some(outcome.authorization_code.clone()),
            denial_code: None,
            denial_reason: None,
            received_at: Utc::now(),
        };
        let event_id = self.event_store.append(&mut tx, &event, sequence, metadata).await?;
        self.read_model
            .update_to_authorized(&mut tx, auth_request_id, sequence, event_id, outcome)
            .await?;

        tx.commit().await?;

        Ok(sequence)
    }

    /// PROCESSING -> DENIED, appending `AuthResponseReceived`.
    pub async fn record_denied(
        &self,
        auth_request_id: Uuid,
        outcome: &DeniedOutcome,
        metadata: &HashMap<String, String>,
    ) -> Result<i32, TransactionError> {
        let mut tx = self.event_store.pool().begin().await?;

        let sequence = self.event_store.next_sequence(&mut tx, auth_request_id).await?;
        let event = AuthEvent::AuthResponseReceived {
            auth_request_id,
            outcome: ResponseOutcome::Denied,
            processor_name: outcome.processor_name.clone(),
            processor_auth_id: None,
            authorized_amount_cents: None,
            authorization_code: None,
            denial_code: Some(outcome.denial_code.clone()),
            denial_reason: Some(outcome.denial_reason.clone()),
            received_at: Utc::now(),
        };
        let event_id = self.event_store.append(&mut tx, &event, sequence, metadata).await?;
        self.read_model
            .update_to_denied(&mut tx, auth_request_id, sequence, event_id, outcome)
            .await?;

        tx.commit().await?;

        Ok(sequence)
    }

    /// PROCESSING -> FAILED, appending a non-retryable `AuthAttemptFailed`.
    pub async fn record_failed_terminal(
        &self,
        auth_request_id: Uuid,
        retry_count: i32,
        error_code: &str,
        error_message: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<i32, TransactionError> {
        let mut tx = self.event_store.pool().begin().await?;

        let sequence = self.event_store.next_sequence(&mut tx, auth_request_id).await?;
        let event = AuthEvent::AuthAttemptFailed {
            auth_request_id,
            is_retryable: false,
            retry_count,
            error_code: error_code.to_string(),
            error_message: error_message.to_string(),
            failed_at: Utc::now(),
        };
        let event_id = self.event_store.append(&mut tx, &event, sequence, metadata).await?;
        self.read_model
            .update_to_failed(&mut tx, auth_request_id, sequence, event_id)
            .await?;

        tx.commit().await?;

        Ok(sequence)
    }

    /// PROCESSING -> PROCESSING, appending a retryable `AuthAttemptFailed`.
    /// Status does not change; only the sequence advances (§4.7 step 6b).
    pub async fn record_failed_retryable(
        &self,
        auth_request_id: Uuid,
        retry_count: i32,
        error_code: &str,
        error_message: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<i32, TransactionError> {
        let mut tx = self.event_store.pool().begin().await?;

        let sequence = self.event_store.next_sequence(&mut tx, auth_request_id).await?;
        let event = AuthEvent::AuthAttemptFailed {
            auth_request_id,
            is_retryable: true,
            retry_count,
            error_code: error_code.to_string(),
            error_message: error_message.to_string(),
            failed_at: Utc::now(),
        };
        let event_id = self.event_store.append(&mut tx, &event, sequence, metadata).await?;
        self.read_model
            .update_retry_attempt(&mut tx, auth_request_id, sequence, event_id)
            .await?;

        tx.commit().await?;

        Ok(sequence)
    }

    /// PENDING|PROCESSING -> EXPIRED, appending `AuthRequestExpired`.
    pub async fn record_expired(
        &self,
        auth_request_id: Uuid,
        metadata: &HashMap<String, String>,
    ) -> Result<i32, TransactionError> {
        let mut tx = self.event_store.pool().begin().await?;

        let sequence = self.event_store.next_sequence(&mut tx, auth_request_id).await?;
        let event = AuthEvent::AuthRequestExpired {
            auth_request_id,
            expired_at: Utc::now(),
        };
        let event_id = self.event_store.append(&mut tx, &event, sequence, metadata).await?;
        self.read_model
            .update_to_expired(&mut tx, auth_request_id, sequence, event_id)
            .await?;

        tx.commit().await?;

        Ok(sequence)
    }
}
