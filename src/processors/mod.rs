//! Payment Processor Abstraction
//!
//! The actual card networks/processors are external collaborators out of
//! scope for this crate (§1); what lives here is the contract the worker
//! orchestrator calls through, plus a registry that resolves a restaurant's
//! configured processor by name. Grounded on the `PaymentProcessor`
//! interface and `ProcessorRegistry` in
//! `auth_processor_worker/processors/base.py` and `registry.py`.

pub mod mock;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tokenization::PaymentData;

/// Terminal decision a processor returns for an authorize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Authorized,
    Denied,
}

/// The processor's response to an authorize request, covering both the
/// authorized and denied shapes — fields not relevant to the outcome are
/// left `None`, matching `AuthorizationResult` in `processor.py`.
#[derive(Debug, Clone)]
pub struct AuthorizationResult {
    pub status: AuthStatus,
    pub processor_name: String,
    pub processor_auth_id: Option<String>,
    pub authorization_code: Option<String>,
    pub authorized_amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub denial_code: Option<String>,
    pub denial_reason: Option<String>,
}

/// Only a timeout/unreachable outcome is modeled as an error; declines are
/// a normal `AuthorizationResult` with `status == Denied` (§4.7, §7 —
/// "ProcessorBusiness: not an error").
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProcessorError {
    #[error("payment processor did not respond in time")]
    ProcessorTimeout,
}

/// The authorize contract a processor adapter implements.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn name(&self) -> &str;

    async fn authorize(
        &self,
        payment_data: &PaymentData,
        amount_cents: i64,
        currency: &str,
        processor_config: &serde_json::Value,
    ) -> Result<AuthorizationResult, ProcessorError>;
}

/// Resolves a restaurant's configured processor by name (§4.9).
pub trait ProcessorRegistry: Send + Sync {
    fn resolve(&self, processor_name: &str) -> Option<Arc<dyn PaymentProcessor>>;
}

/// A fixed, in-process registry keyed by processor name. Production
/// wiring registers one entry per supported network; tests register just
/// the mock.
#[derive(Clone, Default)]
pub struct StaticProcessorRegistry {
    processors: HashMap<String, Arc<dyn PaymentProcessor>>,
}

impl StaticProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    pub fn with_processor(mut self, processor: Arc<dyn PaymentProcessor>) -> Self {
        self.processors.insert(processor.name().to_string(), processor);
        self
    }
}

impl ProcessorRegistry for StaticProcessorRegistry {
    fn resolve(&self, processor_name: &str) -> Option<Arc<dyn PaymentProcessor>> {
        self.processors.get(processor_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockProcessor;
    use super::*;

    #[test]
    fn test_registry_resolves_registered_processor() {
        let registry = StaticProcessorRegistry::new().with_processor(Arc::new(MockProcessor::new()));
        assert!(registry.resolve("mock").is_some());
        assert!(registry.resolve("nonexistent").is_none());
    }
}
