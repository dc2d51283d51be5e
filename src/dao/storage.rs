use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by statistics backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was being attempted.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored record could not be converted into a [`PlayerStatsEntity`](super::models::PlayerStatsEntity).
    #[error("corrupted statistics record for `{user_id}`: {message}")]
    Corrupted {
        /// Account whose record is broken.
        user_id: String,
        /// What is wrong with it.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
