//! Domain Events
//!
//! Event definitions for the authorization request event stream.
//! Events are immutable facts that have happened in the system. They are
//! serialized with `bincode` for storage in `payment_events.event_data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::amount::AmountCents;

/// The outcome carried by an `AuthResponseReceived` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    Authorized,
    Denied,
}

/// Events that make up the `auth_request` aggregate stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthEvent {
    /// The intake handler accepted a new authorization request.
    AuthRequestCreated {
        auth_request_id: Uuid,
        restaurant_id: Uuid,
        payment_token: String,
        amount_cents: AmountCents,
        currency: String,
        created_at: DateTime<Utc>,
    },

    /// A worker claimed the lock and began a processor attempt.
    AuthAttemptStarted {
        auth_request_id: Uuid,
        worker_id: String,
        attempt_number: i32,
        started_at: DateTime<Utc>,
    },

    /// The processor returned a terminal authorize/deny decision.
    AuthResponseReceived {
        auth_request_id: Uuid,
        outcome: ResponseOutcome,
        processor_name: String,
        processor_auth_id: Option<String>,
        authorized_amount_cents: Option<i64>,
        authorization_code: Option<String>,
        denial_code: Option<String>,
        denial_reason: Option<String>,
        received_at: DateTime<Utc>,
    },

    /// A processor attempt failed, either terminally or retryably.
    AuthAttemptFailed {
        auth_request_id: Uuid,
        is_retryable: bool,
        retry_count: i32,
        error_code: String,
        error_message: String,
        failed_at: DateTime<Utc>,
    },

    /// The request aged out before reaching a terminal outcome.
    AuthRequestExpired {
        auth_request_id: Uuid,
        expired_at: DateTime<Utc>,
    },

    /// A caller requested the authorization be voided.
    AuthVoidRequested {
        auth_request_id: Uuid,
        requested_by: Option<String>,
        requested_at: DateTime<Utc>,
    },
}

impl AuthEvent {
    /// Get the event type as a string, matching the `event_type` column.
    pub fn event_type(&self) -> &'static str {
        match self {
            AuthEvent::AuthRequestCreated { .. } => "AuthRequestCreated",
            AuthEvent::AuthAttemptStarted { .. } => "AuthAttemptStarted",
            AuthEvent::AuthResponseReceived { .. } => "AuthResponseReceived",
            AuthEvent::AuthAttemptFailed { .. } => "AuthAttemptFailed",
            AuthEvent::AuthRequestExpired { .. } => "AuthRequestExpired",
            AuthEvent::AuthVoidRequested { .. } => "AuthVoidRequested",
        }
    }

    /// Get the aggregate ID (`auth_request_id`) this event belongs to.
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            AuthEvent::AuthRequestCreated { auth_request_id, .. } => *auth_request_id,
            AuthEvent::AuthAttemptStarted { auth_request_id, .. } => *auth_request_id,
            AuthEvent::AuthResponseReceived { auth_request_id, .. } => *auth_request_id,
            AuthEvent::AuthAttemptFailed { auth_request_id, .. } => *auth_request_id,
            AuthEvent::AuthRequestExpired { auth_request_id, .. } => *auth_request_id,
            AuthEvent::AuthVoidRequested { auth_request_id, .. } => *auth_request_id,
        }
    }
}

/// A generic event envelope as read back from `payment_events`, with the
/// payload already decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub sequence_number: i32,
    pub event_type: String,
    pub event: AuthEvent,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_event_bincode_roundtrip() {
        let event = AuthEvent::AuthRequestCreated {
            auth_request_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            payment_token: "tok_test_1".to_string(),
            amount_cents: AmountCents::new(1500).unwrap(),
            currency: "USD".to_string(),
            created_at: Utc::now(),
        };

        let encoded = bincode::serialize(&event).unwrap();
        let decoded: AuthEvent = bincode::deserialize(&encoded).unwrap();

        assert_eq!(event.event_type(), decoded.event_type());
        assert_eq!(event.aggregate_id(), decoded.aggregate_id());
    }

    #[test]
    fn test_attempt_failed_retry_fields() {
        let event = AuthEvent::AuthAttemptFailed {
            auth_request_id: Uuid::new_v4(),
            is_retryable: true,
            retry_count: 2,
            error_code: "PROCESSOR_TIMEOUT".to_string(),
            error_message: "processor did not respond in time".to_string(),
            failed_at: Utc::now(),
        };

        assert_eq!(event.event_type(), "AuthAttemptFailed");
        match event {
            AuthEvent::AuthAttemptFailed {
                is_retryable,
                retry_count,
                ..
            } => {
                assert!(is_retryable);
                assert_eq!(retry_count, 2);
            }
            _ => panic!("expected AuthAttemptFailed"),
        }
    }

    #[test]
    fn test_response_outcome_serde_rename() {
        let json = serde_json::to_string(&ResponseOutcome::Authorized).unwrap();
        assert_eq!(json, "\"authorized\"");
    }
}
