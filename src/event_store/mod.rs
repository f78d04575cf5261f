//! Event Store module
//!
//! Persistence layer for event sourcing. Handles appending and retrieving
//! `auth_request` events in PostgreSQL with gap-free per-aggregate
//! sequence numbers.

mod error;
mod repository;

pub use error::{is_unique_sequence_violation, EventStoreError};
pub use repository::EventStore;
