//! Key-management provider boundary
//!
//! The envelope layer never sees a master key. It asks a provider to
//! encrypt or decrypt small payloads under a master key identified by
//! reference, and relies on the provider to report one of three failure
//! categories:
//!
//! - [`CryptoError::KeyManagementUnavailable`] when the provider cannot be reached
//! - [`CryptoError::KeyManagementDenied`] when it refuses the request
//! - [`CryptoError::CorruptEnvelope`] when asked to decrypt something it did not produce
//!
//! [`CryptoError::KeyManagementUnavailable`]: crate::CryptoError::KeyManagementUnavailable
//! [`CryptoError::KeyManagementDenied`]: crate::CryptoError::KeyManagementDenied
//! [`CryptoError::CorruptEnvelope`]: crate::CryptoError::CorruptEnvelope

pub mod local;
pub mod rest;

pub use local::LocalKms;
pub use rest::{RestKms, RestKmsConfig};

use crate::Result;
use async_trait::async_trait;

/// An external service that holds master keys
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyManagementProvider: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &'static str;

    /// Encrypt `plaintext` under the master key `key_ref`
    async fn encrypt(&self, key_ref: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext` previously produced by [`encrypt`](Self::encrypt)
    async fn decrypt(&self, key_ref: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;
}
