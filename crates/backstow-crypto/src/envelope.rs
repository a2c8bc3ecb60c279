//! Envelope encryption of data keys
//!
//! A backup's [`DataKey`] is wrapped by a [`KeyManagementProvider`] under a
//! master key reference. Only the resulting [`WrappedKey`] is persisted.
//! Every failure is surfaced as-is: there is no fallback key and no retry.

use crate::{framing, keys::DataKey, kms::KeyManagementProvider, CryptoError, Result};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Ciphertext of a data key, opaque to everything except its provider
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    /// Wrap raw provider output
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the wrapped bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the wrapped key is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the wrapped bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedKey({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for WrappedKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Wraps and unwraps data keys through a key-management provider
#[derive(Clone)]
pub struct EnvelopeCipher {
    provider: Arc<dyn KeyManagementProvider>,
}

impl EnvelopeCipher {
    /// Create a cipher backed by `provider`
    pub fn new(provider: Arc<dyn KeyManagementProvider>) -> Self {
        Self { provider }
    }

    /// Encrypt `data_key` under the master key `master_key_ref`
    #[instrument(skip(self, data_key), fields(provider = self.provider.name()))]
    pub async fn wrap(&self, data_key: &DataKey, master_key_ref: &str) -> Result<WrappedKey> {
        let wrapped = self
            .provider
            .encrypt(master_key_ref, data_key.as_bytes())
            .await?;
        framing::check_length(wrapped.len()).map_err(|e| {
            error!(len = wrapped.len(), "provider returned a wrapped key that cannot be stored");
            e
        })?;
        debug!(len = wrapped.len(), "wrapped data key");
        Ok(WrappedKey(wrapped))
    }

    /// Recover the data key from `wrapped`
    #[instrument(skip(self, wrapped), fields(provider = self.provider.name(), len = wrapped.len()))]
    pub async fn unwrap(&self, wrapped: &WrappedKey, master_key_ref: &str) -> Result<DataKey> {
        let mut plain = self.provider.decrypt(master_key_ref, wrapped.as_bytes()).await?;
        let key = DataKey::from_bytes(&plain).map_err(|_| {
            error!(len = plain.len(), "provider returned key material of the wrong size");
            CryptoError::CorruptEnvelope(format!(
                "unwrapped key has {} bytes, expected {}",
                plain.len(),
                crate::keys::KEY_SIZE
            ))
        });
        zeroize::Zeroize::zeroize(&mut plain);
        key
    }

    /// Generate a fresh data key and wrap it
    pub async fn generate_data_key(&self, master_key_ref: &str) -> Result<(DataKey, WrappedKey)> {
        let key = DataKey::generate();
        let wrapped = self.wrap(&key, master_key_ref).await?;
        Ok((key, wrapped))
    }
}

impl std::fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCipher")
            .field("provider", &self.provider.name())
            .finish()
    }
}
