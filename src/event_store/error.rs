//! Event Store Errors
//!
//! Error types for event store operations.

use uuid::Uuid;

/// Errors that can occur in the event store.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// Two writers raced to append the same `(aggregate_id, sequence_number)`.
    #[error("duplicate sequence {sequence_number} for aggregate {aggregate_id}")]
    DuplicateSequence {
        aggregate_id: Uuid,
        sequence_number: i32,
    },

    /// An event with this `event_id` was already appended.
    #[error("duplicate event id: {0}")]
    DuplicateEventId(Uuid),

    /// No events exist for this aggregate.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Event payload failed to encode or decode.
    #[error("event encoding error: {0}")]
    Encoding(#[from] Box<bincode::ErrorKind>),
}

impl EventStoreError {
    /// Check if this error is a concurrency conflict on the sequence number.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::DuplicateSequence { .. })
    }
}

/// Detect a unique-constraint violation on `unique_aggregate_sequence` so
/// callers can translate a raw database error into a typed conflict.
pub fn is_unique_sequence_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(constraint) = db_err.constraint() {
            return constraint == "unique_aggregate_sequence";
        }
    }
    false
}
