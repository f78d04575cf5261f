//! Distributed Lock Errors

#[derive(Debug, thiserror::Error)]
pub enum LockingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
