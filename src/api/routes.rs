//! Intake API routes
//!
//! `POST /v1/authorize` and `GET /v1/authorize/{id}/status`, grounded on
//! `authorization_api/api/routes/authorize.py`'s `post_authorize` and
//! `poll_for_completion`, and `test_status.py` for the status endpoint's
//! shape.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::amount::AmountCents;
use crate::domain::events::AuthEvent;
use crate::domain::DomainError;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::idempotency::{IdempotencyError, IdempotencyRepository};
use crate::outbox::OutboxRepository;
use crate::read_model::{AuthRequestStatus, ReadModelStore, StateRow};
use crate::Config;

use super::middleware::logging_middleware;

/// Shared application state for the intake API.
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub event_store: EventStore,
    pub read_model: ReadModelStore,
    pub outbox: OutboxRepository,
    pub idempotency: IdempotencyRepository,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: sqlx::PgPool, config: Arc<Config>) -> Self {
        Self {
            event_store: EventStore::new(pool.clone()),
            read_model: ReadModelStore::new(pool.clone()),
            outbox: OutboxRepository::new(pool.clone()),
            idempotency: IdempotencyRepository::new(pool.clone()),
            pool,
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub restaurant_id: Uuid,
    pub payment_token: String,
    pub amount_cents: i64,
    pub currency: String,
    pub idempotency_key: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationResultBody {
    pub processor_name: Option<String>,
    pub processor_auth_id: Option<String>,
    pub authorization_code: Option<String>,
    pub authorized_amount_cents: Option<i64>,
    pub denial_code: Option<String>,
    pub denial_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub auth_request_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AuthorizationResultBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub auth_request_id: Uuid,
    pub restaurant_id: Uuid,
    pub status: String,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AuthorizationResultBody>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub restaurant_id: Uuid,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/authorize", post(create_authorization))
        .route("/v1/authorize/:id/status", get(get_authorization_status))
        .layer(axum::middleware::from_fn(logging_middleware))
        .with_state(state)
}

fn result_body(state: &StateRow) -> Option<AuthorizationResultBody> {
    match state.status {
        AuthRequestStatus::Authorized | AuthRequestStatus::Denied => Some(AuthorizationResultBody {
            processor_name: state.processor_name.clone(),
            processor_auth_id: state.processor_auth_id.clone(),
            authorization_code: state.authorization_code.clone(),
            authorized_amount_cents: state.authorized_amount_cents,
            denial_code: state.denial_code.clone(),
            denial_reason: state.denial_reason.clone(),
        }),
        _ => None,
    }
}

fn authorize_response(state: &StateRow) -> (StatusCode, AuthorizeResponse) {
    if state.status.is_terminal() {
        (
            StatusCode::OK,
            AuthorizeResponse {
                auth_request_id: state.auth_request_id,
                status: state.status.to_string(),
                result: result_body(state),
                status_url: None,
            },
        )
    } else {
        (
            StatusCode::ACCEPTED,
            AuthorizeResponse {
                auth_request_id: state.auth_request_id,
                status: state.status.to_string(),
                result: None,
                status_url: Some(format!(
                    "/v1/authorize/{}/status?restaurant_id={}",
                    state.auth_request_id, state.restaurant_id
                )),
            },
        )
    }
}

/// `POST /v1/authorize` (§4.6).
async fn create_authorization(
    State(state): State<AppState>,
    Json(req): Json<AuthorizeRequest>,
) -> AppResult<(StatusCode, Json<AuthorizeResponse>)> {
    if req.currency.trim().is_empty() {
        return Err(AppError::InvalidRequest("currency must not be empty".to_string()));
    }
    if req.payment_token.trim().is_empty() {
        return Err(AppError::InvalidRequest("payment_token must not be empty".to_string()));
    }
    if req.idempotency_key.trim().is_empty() {
        return Err(AppError::InvalidRequest("idempotency_key must not be empty".to_string()));
    }

    let amount = AmountCents::new(req.amount_cents).map_err(|e| DomainError::InvalidAmount(e.to_string()))?;

    if let Some(existing) = state
        .idempotency
        .find(&req.idempotency_key, req.restaurant_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    {
        let row = state
            .read_model
            .get(existing.auth_request_id)
            .await?
            .ok_or_else(|| DomainError::AuthRequestNotFound(existing.auth_request_id.to_string()))?;
        let (status, body) = authorize_response(&row);
        return Ok((status, Json(body)));
    }

    let auth_request_id = Uuid::new_v4();
    let metadata_map: HashMap<String, String> = HashMap::new();
    let metadata_json = req.metadata.clone().unwrap_or_else(|| serde_json::json!({}));

    let insert_result = insert_new_request(&state, &req, auth_request_id, amount, &metadata_map, &metadata_json).await;

    match insert_result {
        Ok(()) => {}
        Err(AppError::Domain(DomainError::DuplicateIdempotencyKey { .. })) => {
            let existing = state
                .idempotency
                .find(&req.idempotency_key, req.restaurant_id)
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?
                .ok_or_else(|| AppError::Internal("idempotency conflict but no row found".to_string()))?;
            let row = state
                .read_model
                .get(existing.auth_request_id)
                .await?
                .ok_or_else(|| DomainError::AuthRequestNotFound(existing.auth_request_id.to_string()))?;
            let (status, body) = authorize_response(&row);
            return Ok((status, Json(body)));
        }
        Err(err) => return Err(err),
    }

    let final_row = poll_for_completion(&state, auth_request_id).await?;
    let (status, body) = authorize_response(&final_row);
    Ok((status, Json(body)))
}

/// Atomically create the event, read-model row, outbox entry, and
/// idempotency binding for a brand-new request (§4.6 step 2).
async fn insert_new_request(
    state: &AppState,
    req: &AuthorizeRequest,
    auth_request_id: Uuid,
    amount: AmountCents,
    metadata_map: &HashMap<String, String>,
    metadata_json: &serde_json::Value,
) -> AppResult<()> {
    let mut tx = state.pool.begin().await?;

    let sequence = state.event_store.next_sequence(&mut tx, auth_request_id).await?;
    let event = AuthEvent::AuthRequestCreated {
        auth_request_id,
        restaurant_id: req.restaurant_id,
        payment_token: req.payment_token.clone(),
        amount_cents: amount,
        currency: req.currency.clone(),
        created_at: Utc::now(),
    };
    let event_id = state.event_store.append(&mut tx, &event, sequence, metadata_map).await?;

    state
        .read_model
        .create_pending(
            &mut tx,
            auth_request_id,
            req.restaurant_id,
            &req.payment_token,
            amount,
            &req.currency,
            metadata_json,
            sequence,
            event_id,
        )
        .await?;

    state
        .outbox
        .append_auth_request_queued(&mut tx, auth_request_id, req.restaurant_id, Utc::now())
        .await?;

    let insert_result = state
        .idempotency
        .insert(
            &mut tx,
            &req.idempotency_key,
            req.restaurant_id,
            auth_request_id,
            state.config.idempotency_ttl_hours,
        )
        .await;

    match insert_result {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(IdempotencyError::Conflict(key)) => {
            tx.rollback().await?;
            Err(DomainError::DuplicateIdempotencyKey { key }.into())
        }
        Err(IdempotencyError::Database(e)) => Err(AppError::Database(e)),
    }
}

/// Poll the read model until a terminal status or the fast-path budget
/// elapses (§4.6 step 3).
async fn poll_for_completion(state: &AppState, auth_request_id: Uuid) -> AppResult<StateRow> {
    let deadline = Instant::now() + state.config.fast_path_poll_budget();
    let interval = state.config.fast_path_poll_interval();

    loop {
        let row = state
            .read_model
            .get(auth_request_id)
            .await?
            .ok_or_else(|| DomainError::AuthRequestNotFound(auth_request_id.to_string()))?;

        if row.status.is_terminal() || Instant::now() >= deadline {
            return Ok(row);
        }

        tokio::time::sleep(interval).await;
    }
}

/// `GET /v1/authorize/{id}/status` (§6). Returns 404 both when the row is
/// missing and when `restaurant_id` does not match, to avoid leaking
/// existence of another tenant's record.
async fn get_authorization_status(
    State(state): State<AppState>,
    Path(auth_request_id): Path<Uuid>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<StatusResponse>> {
    let row = state
        .read_model
        .get(auth_request_id)
        .await?
        .filter(|row| row.restaurant_id == query.restaurant_id)
        .ok_or_else(|| DomainError::AuthRequestNotFound(auth_request_id.to_string()))?;

    Ok(Json(StatusResponse {
        auth_request_id: row.auth_request_id,
        restaurant_id: row.restaurant_id,
        status: row.status.to_string(),
        amount_cents: row.amount_cents,
        currency: row.currency.clone(),
        result: result_body(&row),
        created_at: row.created_at,
        updated_at: row.updated_at,
        completed_at: row.completed_at,
    }))
}
