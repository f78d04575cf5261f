//! Locking module
//!
//! The distributed lock over `auth_processing_locks` that serializes
//! concurrent worker attempts against the same authorization request
//! (§4.4). At most one worker holds an unexpired lock for a given
//! aggregate at any instant.

mod error;
mod repository;

pub use error::LockingError;
pub use repository::{DistributedLock, LockRow};
