//! Error types for the backstow-core crate

use backstow_crypto::CryptoError;
use backstow_storage::StorageError;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core backup operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Crypto error
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A filesystem safety guard refused to proceed
    #[error("guard violation: {0}")]
    GuardViolation(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether this error means an object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::Storage(e) if e.is_not_found())
    }

    /// Whether the caller's orchestrator may retry the operation
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Storage(e) => e.is_transient(),
            CoreError::Crypto(e) => e.is_transient(),
            _ => false,
        }
    }
}
