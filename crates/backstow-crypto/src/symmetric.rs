//! Authenticated symmetric encryption using AES-GCM and ChaCha20-Poly1305
//!
//! Used by the in-process key-management provider to wrap data keys under
//! a master key.

use crate::{
    keys::{DataKey, KEY_SIZE, NONCE_SIZE},
    CryptoError, Result,
};
use aes_gcm::{aead::Aead as AeadTrait, Aes256Gcm, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A nonce for AEAD encryption
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Nonce {
    bytes: [u8; NONCE_SIZE],
}

impl Nonce {
    /// Generate a random nonce
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::RngCore::fill_bytes(&mut OsRng, &mut bytes);
        Self { bytes }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonce(format!(
                "nonce must be {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; NONCE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Get the nonce bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.bytes
    }
}

/// Supported AEAD ciphers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AeadCipher {
    /// AES-256-GCM
    #[default]
    Aes256Gcm,
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
}

impl AeadCipher {
    /// Get the algorithm identifier string
    pub fn algorithm_id(&self) -> &'static str {
        match self {
            Self::Aes256Gcm => "AES-256-GCM",
            Self::ChaCha20Poly1305 => "ChaCha20-Poly1305",
        }
    }

    /// Single-byte tag written in front of wrapped output
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Aes256Gcm => 1,
            Self::ChaCha20Poly1305 => 2,
        }
    }

    /// Inverse of [`AeadCipher::to_byte`]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Aes256Gcm),
            2 => Some(Self::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// Get the authentication tag size
    pub fn tag_size(&self) -> usize {
        16
    }
}

/// AEAD encryption/decryption under one key
pub struct Aead {
    cipher: AeadCipher,
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl Aead {
    /// Create a new AEAD instance with the given key and cipher
    pub fn new(key: &DataKey, cipher: AeadCipher) -> Self {
        Self {
            cipher,
            key: Zeroizing::new(*key.as_bytes()),
        }
    }

    /// Encrypt data with the given nonce and associated data
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let payload = aes_gcm::aead::Payload { msg: plaintext, aad };

        match self.cipher {
            AeadCipher::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(self.key.as_slice())
                    .map_err(|e| CryptoError::Encryption(e.to_string()))?;
                cipher
                    .encrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), payload)
                    .map_err(|e| CryptoError::Encryption(e.to_string()))
            }
            AeadCipher::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new_from_slice(self.key.as_slice())
                    .map_err(|e| CryptoError::Encryption(e.to_string()))?;
                cipher
                    .encrypt(chacha20poly1305::Nonce::from_slice(nonce.as_bytes()), payload)
                    .map_err(|e| CryptoError::Encryption(e.to_string()))
            }
        }
    }

    /// Decrypt data with the given nonce and associated data.
    ///
    /// Authentication failure means the ciphertext was not produced under
    /// this key and is reported as [`CryptoError::CorruptEnvelope`].
    pub fn decrypt(&self, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let payload = aes_gcm::aead::Payload { msg: ciphertext, aad };

        match self.cipher {
            AeadCipher::Aes256Gcm => {
                let cipher = Aes256Gcm::new_from_slice(self.key.as_slice())
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
                cipher
                    .decrypt(aes_gcm::Nonce::from_slice(nonce.as_bytes()), payload)
                    .map_err(|_| CryptoError::CorruptEnvelope("authentication failed".into()))
            }
            AeadCipher::ChaCha20Poly1305 => {
                let cipher = ChaCha20Poly1305::new_from_slice(self.key.as_slice())
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
                cipher
                    .decrypt(chacha20poly1305::Nonce::from_slice(nonce.as_bytes()), payload)
                    .map_err(|_| CryptoError::CorruptEnvelope("authentication failed".into()))
            }
        }
    }

    /// Get the cipher type
    pub fn cipher(&self) -> AeadCipher {
        self.cipher
    }
}
