//! Transaction Coordinator Errors

use uuid::Uuid;

use crate::event_store::EventStoreError;
use crate::read_model::ReadModelError;

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("read model error: {0}")]
    ReadModel(#[from] ReadModelError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("auth request not found: {0}")]
    NotFound(Uuid),
}
