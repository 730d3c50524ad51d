use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Operation-level description of the failure.
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored record could not be mapped back into a domain entity.
    #[error("corrupt record in `{collection}`: {message}")]
    Corrupt {
        /// Collection or table holding the record.
        collection: &'static str,
        /// What failed to decode.
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

    /// Construct an error for a record that no longer matches the domain model.
    pub fn corrupt(collection: &'static str, message: impl Into<String>) -> Self {
        StorageError::Corrupt {
            collection,
            message: message.into(),
        }
    }
}
