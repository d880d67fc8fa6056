use uuid::Uuid;

use crate::utils::IsTransient;

// ============================================================================
// Storage Errors - failures of the persistence collaborators
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("concurrency conflict on {aggregate_id}: expected version {expected}, current is {actual}")]
    VersionConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut
            ),
            StoreError::Redis(e) => e.is_io_error() || e.is_timeout() || e.is_connection_dropped(),
            StoreError::Unavailable(_) => true,
            StoreError::VersionConflict { .. }
            | StoreError::Serialization(_)
            | StoreError::Corrupt(_) => false,
        }
    }
}
