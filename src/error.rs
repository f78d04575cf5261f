//! Error handling module
//!
//! Centralized error types and HTTP response conversion for the intake API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("missing required header: {0}")]
    MissingHeader(String),

    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    #[error(transparent)]
    EventStore(#[from] crate::event_store::EventStoreError),

    #[error(transparent)]
    ReadModel(#[from] crate::read_model::ReadModelError),

    #[error(transparent)]
    Outbox(#[from] crate::outbox::OutboxError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // Domain errors map onto §7's taxonomy: validation -> 400,
            // not-found -> 404, conflict -> 409.
            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                match domain_err {
                    DomainError::InvalidAmount(msg) => {
                        (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                    }
                    DomainError::NoActiveConfig(id) => {
                        (StatusCode::BAD_REQUEST, "no_active_config", Some(id.clone()))
                    }
                    DomainError::BusinessRuleViolation(msg) => {
                        (StatusCode::BAD_REQUEST, "business_rule_violation", Some(msg.clone()))
                    }
                    DomainError::AuthRequestNotFound(id) => {
                        (StatusCode::NOT_FOUND, "auth_request_not_found", Some(id.clone()))
                    }
                    DomainError::DuplicateIdempotencyKey { key } => {
                        (StatusCode::CONFLICT, "duplicate_idempotency_key", Some(key.clone()))
                    }
                    DomainError::LockHeld(id) => {
                        (StatusCode::CONFLICT, "lock_held", Some(id.clone()))
                    }
                    DomainError::VoidRaced(id) => {
                        (StatusCode::CONFLICT, "void_raced", Some(id.clone()))
                    }
                    DomainError::DuplicateSequence { aggregate_id, .. } => {
                        (StatusCode::CONFLICT, "duplicate_sequence", Some(aggregate_id.clone()))
                    }
                    DomainError::DuplicateEventId(id) => {
                        (StatusCode::CONFLICT, "duplicate_event_id", Some(id.clone()))
                    }
                    DomainError::InvalidStateTransition { from, to } => (
                        StatusCode::CONFLICT,
                        "invalid_state_transition",
                        Some(format!("cannot move from {} to {}", from, to)),
                    ),
                }
            }

            AppError::EventStore(ref event_store_err) => {
                use crate::event_store::EventStoreError;
                match event_store_err {
                    EventStoreError::DuplicateSequence { .. } | EventStoreError::DuplicateEventId(_) => {
                        (StatusCode::CONFLICT, "concurrency_conflict", Some(event_store_err.to_string()))
                    }
                    EventStoreError::AggregateNotFound(id) => {
                        (StatusCode::NOT_FOUND, "auth_request_not_found", Some(id.to_string()))
                    }
                    EventStoreError::Database(e) => {
                        tracing::error!(error = %e, "event store database error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "unexpected_error", None)
                    }
                    EventStoreError::Encoding(e) => {
                        tracing::error!(error = %e, "event encoding error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "unexpected_error", None)
                    }
                }
            }

            AppError::ReadModel(ref read_model_err) => {
                use crate::read_model::ReadModelError;
                match read_model_err {
                    ReadModelError::NotFound(id) => {
                        (StatusCode::NOT_FOUND, "auth_request_not_found", Some(id.to_string()))
                    }
                    ReadModelError::NoActiveConfig(id) => {
                        (StatusCode::BAD_REQUEST, "no_active_config", Some(id.to_string()))
                    }
                    ReadModelError::InvalidStateTransition { from, to, .. } => (
                        StatusCode::CONFLICT,
                        "invalid_state_transition",
                        Some(format!("cannot move from {} to {}", from, to)),
                    ),
                    ReadModelError::Database(e) => {
                        tracing::error!(error = %e, "read model database error");
                        (StatusCode::INTERNAL_SERVER_ERROR, "unexpected_error", None)
                    }
                }
            }

            AppError::Outbox(ref outbox_err) => {
                tracing::error!(error = %outbox_err, "outbox error");
                (StatusCode::INTERNAL_SERVER_ERROR, "unexpected_error", None)
            }

            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "unexpected_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "unexpected_error", None)
            }
            AppError::Config(e) => {
                tracing::error!(error = %e, "configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "unexpected_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
