//! Error types for the backstow-storage crate

use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object not found
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The backend could not be reached or failed mid-operation
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Some names in a bulk delete could not be removed
    #[error("failed to delete {} object(s): {}", .failed.len(), summarize(.failed))]
    PartialDeleteFailure {
        /// `(path, reason)` for every name that was not deleted
        failed: Vec<(String, String)>,
    },

    /// Path cannot name an object
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Write aborted by its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Write aborted because its deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the caller's orchestrator may retry the operation
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::BackendUnavailable(_) | StorageError::PartialDeleteFailure { .. } => true,
            StorageError::Io(e) => e.kind() != std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Whether this error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::ObjectNotFound(_))
    }
}

fn summarize(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(path, reason)| format!("{} ({})", path, reason))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => StorageError::ObjectNotFound(path),
            object_store::Error::InvalidPath { source } => StorageError::InvalidPath(source.to_string()),
            other => StorageError::BackendUnavailable(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::BackendUnavailable(format!("blocking task failed: {}", err))
    }
}

impl From<walkdir::Error> for StorageError {
    fn from(err: walkdir::Error) -> Self {
        StorageError::BackendUnavailable(err.to_string())
    }
}
