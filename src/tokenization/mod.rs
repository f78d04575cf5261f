//! Tokenization client
//!
//! The decryption/tokenization service is an external collaborator out of
//! scope for this crate (§1); only its contract is modeled here, grounded
//! on `PaymentTokenServiceClient`/`_decrypt_payment_token` in
//! `original_source/.../handlers/processor.py` and the `/internal/v1/decrypt`
//! contract of spec §6 (404 -> TokenNotFound, 410 -> TokenExpired,
//! 403 -> Forbidden, 5xx/timeout -> ProcessorTimeout).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Decrypted card data returned by the tokenization service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentData {
    pub card_number: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub cvv: String,
    pub cardholder_name: String,
}

/// Errors raised by a tokenization client, mapped 1:1 onto the terminal
/// vs. retryable distinction the worker orchestrator needs (§4.7 step 5).
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenizationError {
    #[error("payment token not found")]
    TokenNotFound,

    #[error("payment token has expired")]
    TokenExpired,

    #[error("restaurant is not authorized to decrypt this token")]
    Forbidden,

    #[error("tokenization service unreachable or timed out")]
    ProcessorTimeout,
}

impl TokenizationError {
    /// Terminal errors end the aggregate's processing attempt for good;
    /// `ProcessorTimeout` is the only retryable outcome (§4.7, §7).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TokenizationError::ProcessorTimeout)
    }
}

/// The decrypt contract consumed by the worker orchestrator.
#[async_trait]
pub trait TokenizationClient: Send + Sync {
    async fn decrypt(
        &self,
        payment_token: &str,
        restaurant_id: Uuid,
        requesting_service: &str,
    ) -> Result<PaymentData, TokenizationError>;
}

/// A test double keyed by payment token, returning canned outcomes. Mirrors
/// the card-number-keyed table shape of `processors::mock::MockProcessor`
/// so both external collaborators can be scripted the same way in tests.
#[derive(Debug, Clone)]
pub enum StaticOutcome {
    Success(PaymentData),
    NotFound,
    Expired,
    Forbidden,
    Timeout,
}

pub struct StaticTokenizationClient {
    outcomes: std::collections::HashMap<String, StaticOutcome>,
    default: StaticOutcome,
}

impl StaticTokenizationClient {
    /// Defaults unknown tokens to a generic successful decrypt using a
    /// Stripe test card number, matching the scenarios in spec §8.
    pub fn new() -> Self {
        Self {
            outcomes: std::collections::HashMap::new(),
            default: StaticOutcome::Success(PaymentData {
                card_number: "4242424242424242".to_string(),
                exp_month: 12,
                exp_year: 2030,
                cvv: "123".to_string(),
                cardholder_name: "Test Cardholder".to_string(),
            }),
        }
    }

    pub fn with_outcome(mut self, payment_token: impl Into<String>, outcome: StaticOutcome) -> Self {
        self.outcomes.insert(payment_token.into(), outcome);
        self
    }
}

impl Default for StaticTokenizationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenizationClient for StaticTokenizationClient {
    async fn decrypt(
        &self,
        payment_token: &str,
        _restaurant_id: Uuid,
        _requesting_service: &str,
    ) -> Result<PaymentData, TokenizationError> {
        let outcome = self.outcomes.get(payment_token).unwrap_or(&self.default);
        match outcome {
            StaticOutcome::Success(data) => Ok(data.clone()),
            StaticOutcome::NotFound => Err(TokenizationError::TokenNotFound),
            StaticOutcome::Expired => Err(TokenizationError::TokenExpired),
            StaticOutcome::Forbidden => Err(TokenizationError::Forbidden),
            StaticOutcome::Timeout => Err(TokenizationError::ProcessorTimeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_outcome_succeeds() {
        let client = StaticTokenizationClient::new();
        let result = client
            .decrypt("tok_anything", Uuid::new_v4(), "authorization-worker")
            .await
            .unwrap();
        assert_eq!(result.card_number, "4242424242424242");
    }

    #[tokio::test]
    async fn test_scripted_outcome_overrides_default() {
        let client = StaticTokenizationClient::new()
            .with_outcome("tok_missing", StaticOutcome::NotFound)
            .with_outcome("tok_stale", StaticOutcome::Expired);

        let err = client
            .decrypt("tok_missing", Uuid::new_v4(), "authorization-worker")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenizationError::TokenNotFound));
        assert!(err.is_terminal());

        let err = client
            .decrypt("tok_stale", Uuid::new_v4(), "authorization-worker")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenizationError::TokenExpired));
    }

    #[tokio::test]
    async fn test_timeout_is_not_terminal() {
        let client = StaticTokenizationClient::new()
            .with_outcome("tok_slow", StaticOutcome::Timeout);

        let err = client
            .decrypt("tok_slow", Uuid::new_v4(), "authorization-worker")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenizationError::ProcessorTimeout));
        assert!(!err.is_terminal());
    }
}
