//! Error types for the backstow-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during envelope operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The framed key record ended before the declared data was read
    #[error("truncated envelope: expected {expected} bytes, got {available}")]
    TruncatedEnvelope { expected: usize, available: usize },

    /// The wrapped key is not something the provider produced
    #[error("corrupt envelope: {0}")]
    CorruptEnvelope(String),

    /// The key-management provider refused the request
    #[error("key management denied: {0}")]
    KeyManagementDenied(String),

    /// The key-management provider could not be reached
    #[error("key management unavailable: {0}")]
    KeyManagementUnavailable(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Invalid nonce
    #[error("invalid nonce: {0}")]
    InvalidNonce(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Hex decode error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

impl CryptoError {
    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, CryptoError::KeyManagementUnavailable(_))
    }
}

impl From<reqwest::Error> for CryptoError {
    fn from(err: reqwest::Error) -> Self {
        CryptoError::KeyManagementUnavailable(err.to_string())
    }
}
