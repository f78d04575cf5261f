//! Authorization Core
//!
//! Event-sourced payment authorization pipeline: intake, outbox dispatch,
//! and worker processing. Re-exports modules for the three binaries
//! (`authorization-api`, `outbox-dispatcher`, `authorization-worker`) and
//! for integration testing.

pub mod api;
pub mod dispatcher;
pub mod domain;
pub mod event_store;
pub mod idempotency;
pub mod locking;
pub mod outbox;
pub mod processors;
pub mod queue;
pub mod read_model;
pub mod tokenization;
pub mod transaction;
pub mod worker;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{AmountCents, AmountError, DomainError, OperationContext};
