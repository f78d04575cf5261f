//! Read Model module
//!
//! The denormalized `auth_request_state` projection: the single source of
//! "current status" for an authorization request, always written in the
//! same database transaction as the event that produced it (see
//! `crate::transaction`).

mod error;
mod repository;

pub use error::ReadModelError;
pub use repository::{
    AuthRequestStatus, AuthorizedOutcome, DeniedOutcome, ReadModelStore, RestaurantPaymentConfig,
    StateRow,
};
