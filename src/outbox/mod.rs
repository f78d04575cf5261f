//! Outbox module
//!
//! The transactional outbox: intake writes `auth_request_queued` rows in
//! the same transaction as the triggering event, and the outbox
//! dispatcher (`crate::dispatcher`) relays them to the FIFO queue
//! at-least-once.

mod error;
mod repository;

pub use error::OutboxError;
pub use repository::{
    AuthRequestQueuedPayload, OutboxEntry, OutboxRepository, MESSAGE_TYPE_AUTH_REQUEST_QUEUED,
};
