//! Mock payment processor
//!
//! A deterministic processor keyed by card number, ported from the
//! `TEST_CARD_BEHAVIORS` table in
//! `auth_processor_worker/processors/mock_processor.py`. Used as the
//! default processor for the seeded restaurant config and in tests.

use async_trait::async_trait;

use super::{AuthStatus, AuthorizationResult, PaymentProcessor, ProcessorError};
use crate::tokenization::PaymentData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardBehavior {
    Success,
    Decline(&'static str, &'static str),
    Timeout,
}

/// Test card numbers and their scripted behavior, matching the original
/// mock processor's table verbatim.
const TEST_CARD_BEHAVIORS: &[(&str, CardBehavior)] = &[
    ("4242424242424242", CardBehavior::Success),
    ("5555555555554444", CardBehavior::Success),
    ("378282246310005", CardBehavior::Success),
    ("4000000000000002", CardBehavior::Decline("generic_decline", "Your card was declined.")),
    (
        "4000000000009995",
        CardBehavior::Decline("insufficient_funds", "Your card has insufficient funds."),
    ),
    ("4000000000000069", CardBehavior::Decline("expired_card", "Your card has expired.")),
    (
        "4000000000000127",
        CardBehavior::Decline("incorrect_cvc", "Your card's security code is incorrect."),
    ),
    ("4000000000000341", CardBehavior::Decline("lost_card", "Your card was declined.")),
    ("4000000000000226", CardBehavior::Decline("fraudulent", "Your card was declined.")),
    ("4000000000000119", CardBehavior::Timeout),
    ("4000000000009987", CardBehavior::Timeout),
    (
        "4000002500003155",
        CardBehavior::Decline("requires_action", "This card requires additional authentication."),
    ),
];

fn lookup_behavior(card_number: &str) -> CardBehavior {
    TEST_CARD_BEHAVIORS
        .iter()
        .find(|(number, _)| *number == card_number)
        .map(|(_, behavior)| *behavior)
        .unwrap_or(CardBehavior::Success)
}

pub struct MockProcessor;

impl MockProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn authorize(
        &self,
        payment_data: &PaymentData,
        amount_cents: i64,
        currency: &str,
        _processor_config: &serde_json::Value,
    ) -> Result<AuthorizationResult, ProcessorError> {
        match lookup_behavior(&payment_data.card_number) {
            CardBehavior::Success => Ok(AuthorizationResult {
                status: AuthStatus::Authorized,
                processor_name: self.name().to_string(),
                processor_auth_id: Some(format!("mock_auth_{}", uuid::Uuid::new_v4())),
                authorization_code: Some(format!("{:06}", amount_cents % 1_000_000)),
                authorized_amount_cents: Some(amount_cents),
                currency: Some(currency.to_string()),
                denial_code: None,
                denial_reason: None,
            }),
            CardBehavior::Decline(code, reason) => Ok(AuthorizationResult {
                status: AuthStatus::Denied,
                processor_name: self.name().to_string(),
                processor_auth_id: None,
                authorization_code: None,
                authorized_amount_cents: None,
                currency: None,
                denial_code: Some(code.to_string()),
                denial_reason: Some(reason.to_string()),
            }),
            CardBehavior::Timeout => Err(ProcessorError::ProcessorTimeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_data(card_number: &str) -> PaymentData {
        PaymentData {
            card_number: card_number.to_string(),
            exp_month: 12,
            exp_year: 2030,
            cvv: "123".to_string(),
            cardholder_name: "Test Cardholder".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_card_authorizes() {
        let processor = MockProcessor::new();
        let result = processor
            .authorize(&payment_data("4242424242424242"), 1500, "USD", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.status, AuthStatus::Authorized);
        assert_eq!(result.authorized_amount_cents, Some(1500));
        assert!(result.processor_auth_id.is_some());
    }

    #[tokio::test]
    async fn test_generic_decline_card() {
        let processor = MockProcessor::new();
        let result = processor
            .authorize(&payment_data("4000000000000002"), 1500, "USD", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.status, AuthStatus::Denied);
        assert_eq!(result.denial_code.as_deref(), Some("generic_decline"));
    }

    #[tokio::test]
    async fn test_insufficient_funds_card() {
        let processor = MockProcessor::new();
        let result = processor
            .authorize(&payment_data("4000000000009995"), 1500, "USD", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.denial_code.as_deref(), Some("insufficient_funds"));
    }

    #[tokio::test]
    async fn test_requires_action_card_is_a_denial() {
        let processor = MockProcessor::new();
        let result = processor
            .authorize(&payment_data("4000002500003155"), 1500, "USD", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.status, AuthStatus::Denied);
        assert_eq!(result.denial_code.as_deref(), Some("requires_action"));
    }

    #[tokio::test]
    async fn test_timeout_card_returns_processor_error() {
        let processor = MockProcessor::new();
        let err = processor
            .authorize(&payment_data("4000000000000119"), 1500, "USD", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::ProcessorTimeout));
    }

    #[tokio::test]
    async fn test_rate_limit_card_also_times_out() {
        let processor = MockProcessor::new();
        let err = processor
            .authorize(&payment_data("4000000000009987"), 1500, "USD", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::ProcessorTimeout));
    }

    #[tokio::test]
    async fn test_unknown_card_defaults_to_success() {
        let processor = MockProcessor::new();
        let result = processor
            .authorize(&payment_data("4111111111111111"), 500, "USD", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.status, AuthStatus::Authorized);
    }
}
