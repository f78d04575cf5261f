//! Read Model Errors

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ReadModelError {
    #[error("auth request not found: {0}")]
    NotFound(Uuid),

    #[error("no active payment config for restaurant: {0}")]
    NoActiveConfig(Uuid),

    /// A mutator was asked to move a row to a status unreachable from its
    /// current one (see the state machine in §4.7 of the specification).
    #[error("invalid state transition for {auth_request_id}: {from} -> {to}")]
    InvalidStateTransition {
        auth_request_id: Uuid,
        from: String,
        to: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
