//! Symmetric key material
//!
//! A [`DataKey`] encrypts one backup's content. It is never persisted in the
//! clear: the envelope layer wraps it under a master key held by a
//! key-management provider and only the wrapped form is stored.

use crate::{CryptoError, Result};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of a nonce in bytes (96 bits for AES-GCM/ChaCha20-Poly1305)
pub const NONCE_SIZE: usize = 12;

/// A per-backup data encryption key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    key: [u8; KEY_SIZE],
}

impl DataKey {
    /// Generate a new random data key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut key);
        Self { key }
    }

    /// Create a data key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "data key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Decode a data key from hex
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s.trim())?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Encode as hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.key)
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_key_generation() {
        let k1 = DataKey::generate();
        let k2 = DataKey::generate();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_data_key_wrong_length() {
        let result = DataKey::from_bytes(&[0u8; 16]);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_hex_roundtrip() {
        let key = DataKey::generate();
        let decoded = DataKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_debug_does_not_leak() {
        let key = DataKey::from_bytes(&[0xab; KEY_SIZE]).unwrap();
        let printed = format!("{:?}", key);
        assert!(!printed.contains("ab"));
    }
}
