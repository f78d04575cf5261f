//! Worker orchestrator
//!
//! The single per-message processing pipeline: acquire the lock, check for
//! a racing void, start the attempt, decrypt, authorize, and record the
//! outcome — always releasing the lock on the way out. Grounded on
//! `process_auth_request` in
//! `auth_processor_worker/handlers/processor.py`; the Python `try/finally`
//! around the lock becomes the unconditional release after `process_locked`
//! here.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::event_store::EventStore;
use crate::locking::DistributedLock;
use crate::processors::{AuthStatus, ProcessorRegistry};
use crate::read_model::{AuthorizedOutcome, DeniedOutcome, ReadModelStore};
use crate::tokenization::TokenizationClient;
use crate::transaction::TransactionCoordinator;

/// Outcome of one `process()` call, consumed by the queue consumer to
/// decide whether to delete the message (§4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    /// Reached a terminal or decline outcome; delete the message.
    Success,
    /// Another worker holds the lock; leave the message for a future poll.
    SkippedLock,
    /// The request was voided before this attempt started; delete the message.
    SkippedVoid,
    /// A non-retryable failure was recorded; delete the message.
    TerminalFailure,
    /// A retryable failure was recorded; do not delete, let visibility
    /// timeout re-expose the message.
    RetryableFailure,
}

pub struct WorkerOrchestrator {
    event_store: EventStore,
    read_model: ReadModelStore,
    lock: DistributedLock,
    coordinator: TransactionCoordinator,
    tokenization: std::sync::Arc<dyn TokenizationClient>,
    processors: std::sync::Arc<dyn ProcessorRegistry>,
    max_retries: i32,
    lock_ttl_seconds: i64,
}

impl WorkerOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_store: EventStore,
        read_model: ReadModelStore,
        lock: DistributedLock,
        coordinator: TransactionCoordinator,
        tokenization: std::sync::Arc<dyn TokenizationClient>,
        processors: std::sync::Arc<dyn ProcessorRegistry>,
        max_retries: i32,
        lock_ttl_seconds: i64,
    ) -> Self {
        Self {
            event_store,
            read_model,
            lock,
            coordinator,
            tokenization,
            processors,
            max_retries,
            lock_ttl_seconds,
        }
    }

    /// Process one delivery of `auth_request_id`. `receive_count` is the
    /// queue's redelivery counter, used directly as the attempt number.
    pub async fn process(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        receive_count: i32,
    ) -> ProcessingResult {
        let acquired = match self.lock.try_acquire(auth_request_id, worker_id, self.lock_ttl_seconds).await {
            Ok(acquired) => acquired,
            Err(err) => {
                tracing::error!(%auth_request_id, error = %err, "failed to acquire processing lock");
                return ProcessingResult::RetryableFailure;
            }
        };

        if !acquired {
            tracing::debug!(%auth_request_id, "processing lock held by another worker, skipping");
            return ProcessingResult::SkippedLock;
        }

        let result = self.process_locked(auth_request_id, worker_id, receive_count).await;

        if let Err(err) = self.lock.release(auth_request_id, worker_id).await {
            tracing::error!(%auth_request_id, error = %err, "failed to release processing lock");
        }

        result
    }

    async fn process_locked(
        &self,
        auth_request_id: Uuid,
        worker_id: &str,
        receive_count: i32,
    ) -> ProcessingResult {
        let metadata = worker_metadata(worker_id);

        match self.check_voided(auth_request_id).await {
            Ok(true) => {
                if let Err(err) = self.coordinator.record_expired(auth_request_id, &metadata).await {
                    tracing::error!(%auth_request_id, error = %err, "failed to record expiry for voided request");
                }
                return ProcessingResult::SkippedVoid;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(%auth_request_id, error = %err, "failed to check for a racing void");
                return ProcessingResult::RetryableFailure;
            }
        }

        let state = match self.read_model.get(auth_request_id).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                return self
                    .terminal_failure(auth_request_id, receive_count, "NOT_FOUND", "auth request has no read-model row", &metadata)
                    .await;
            }
            Err(err) => {
                tracing::error!(%auth_request_id, error = %err, "failed to load auth request state");
                return ProcessingResult::RetryableFailure;
            }
        };

        if state.status.is_terminal() {
            tracing::debug!(%auth_request_id, status = %state.status, "auth request already terminal, skipping");
            return ProcessingResult::Success;
        }

        // Step 3 (§4.7): move to PROCESSING before loading config, so a
        // missing config can still be recorded as a terminal failure
        // (PROCESSING -> FAILED is the only legal source for that
        // transition; PENDING -> FAILED is not).
        if let Err(err) = self
            .coordinator
            .record_started(auth_request_id, worker_id, receive_count, &metadata)
            .await
        {
            tracing::error!(%auth_request_id, error = %err, "failed to record attempt start");
            return ProcessingResult::RetryableFailure;
        }

        let config = match self.read_model.get_config(state.restaurant_id).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                return self
                    .terminal_failure(auth_request_id, receive_count, "CONFIG_NOT_FOUND", "no active payment config for restaurant", &metadata)
                    .await;
            }
            Err(err) => {
                tracing::error!(%auth_request_id, error = %err, "failed to load restaurant payment config");
                return ProcessingResult::RetryableFailure;
            }
        };

        let payment_data = match self
            .tokenization
            .decrypt(&state.payment_token, state.restaurant_id, "authorization-worker")
            .await
        {
            Ok(data) => data,
            Err(err) => {
                return if err.is_terminal() {
                    self.terminal_failure(auth_request_id, receive_count, "TOKEN_ERROR", &err.to_string(), &metadata)
                        .await
                } else {
                    self.retry_or_fail(auth_request_id, receive_count, "TOKEN_SERVICE_TIMEOUT", &err.to_string(), &metadata)
                        .await
                };
            }
        };

        let processor = match self.processors.resolve(&config.processor_name) {
            Some(processor) => processor,
            None => {
                return self
                    .terminal_failure(
                        auth_request_id,
                        receive_count,
                        "UNKNOWN_PROCESSOR",
                        &format!("no processor registered for '{}'", config.processor_name),
                        &metadata,
                    )
                    .await;
            }
        };

        let authorize_result = processor
            .authorize(&payment_data, state.amount_cents, &state.currency, &config.processor_config)
            .await;

        match authorize_result {
            Ok(result) if result.status == AuthStatus::Authorized => {
                let outcome = AuthorizedOutcome {
                    processor_name: result.processor_name,
                    processor_auth_id: result.processor_auth_id.unwrap_or_default(),
                    authorized_amount_cents: result.authorized_amount_cents.unwrap_or(state.amount_cents),
                    authorization_code: result.authorization_code.unwrap_or_default(),
                };
                if let Err(err) = self.coordinator.record_authorized(auth_request_id, &outcome, &metadata).await {
                    tracing::error!(%auth_request_id, error = %err, "failed to record authorized outcome");
                    return ProcessingResult::RetryableFailure;
                }
                ProcessingResult::Success
            }
            Ok(result) => {
                let outcome = DeniedOutcome {
                    processor_name: result.processor_name,
                    denial_code: result.denial_code.unwrap_or_else(|| "unknown".to_string()),
                    denial_reason: result.denial_reason.unwrap_or_default(),
                };
                if let Err(err) = self.coordinator.record_denied(auth_request_id, &outcome, &metadata).await {
                    tracing::error!(%auth_request_id, error = %err, "failed to record denied outcome");
                    return ProcessingResult::RetryableFailure;
                }
                ProcessingResult::Success
            }
            Err(err) => {
                self.retry_or_fail(auth_request_id, receive_count, "PROCESSOR_TIMEOUT", &err.to_string(), &metadata)
                    .await
            }
        }
    }

    /// Short read-only check for a racing `AuthVoidRequested` event (§4.7
    /// step 2).
    async fn check_voided(&self, auth_request_id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.event_store.pool().begin().await?;
        let has_void = self.event_store.has_void_event(&mut tx, auth_request_id).await?;
        tx.rollback().await?;
        Ok(has_void)
    }

    async fn retry_or_fail(
        &self,
        auth_request_id: Uuid,
        retry_count: i32,
        error_code: &str,
        error_message: &str,
        metadata: &HashMap<String, String>,
    ) -> ProcessingResult {
        if retry_count >= self.max_retries {
            return self
                .terminal_failure(auth_request_id, retry_count, "MAX_RETRIES_EXCEEDED", error_message, metadata)
                .await;
        }

        if let Err(err) = self
            .coordinator
            .record_failed_retryable(auth_request_id, retry_count, error_code, error_message, metadata)
            .await
        {
            tracing::error!(%auth_request_id, error = %err, "failed to record retryable failure");
        }

        ProcessingResult::RetryableFailure
    }

    async fn terminal_failure(
        &self,
        auth_request_id: Uuid,
        retry_count: i32,
        error_code: &str,
        error_message: &str,
        metadata: &HashMap<String, String>,
    ) -> ProcessingResult {
        if let Err(err) = self
            .coordinator
            .record_failed_terminal(auth_request_id, retry_count, error_code, error_message, metadata)
            .await
        {
            tracing::error!(%auth_request_id, error = %err, "failed to record terminal failure");
        }

        ProcessingResult::TerminalFailure
    }
}

fn worker_metadata(worker_id: &str) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("worker_id".to_string(), worker_id.to_string());
    metadata.insert("timestamp".to_string(), Utc::now().to_rfc3339());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_metadata_carries_worker_id() {
        let metadata = worker_metadata("worker-7");
        assert_eq!(metadata.get("worker_id").map(String::as_str), Some("worker-7"));
        assert!(metadata.contains_key("timestamp"));
    }
}
