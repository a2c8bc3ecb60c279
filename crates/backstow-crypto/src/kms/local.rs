//! In-process key-management provider
//!
//! Holds named master keys in memory and wraps payloads with an AEAD cipher.
//! Useful for tests, local development and single-host deployments where the
//! master key is supplied through configuration.
//!
//! Output layout: `cipher id (1) || nonce (12) || ciphertext + tag`.
//! The master key reference is bound as associated data, so a payload
//! wrapped under one key reference cannot be opened under another.

use super::KeyManagementProvider;
use crate::{
    keys::{DataKey, NONCE_SIZE},
    symmetric::{Aead, AeadCipher, Nonce},
    CryptoError, Result,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory key-management provider
#[derive(Default)]
pub struct LocalKms {
    master_keys: RwLock<HashMap<String, DataKey>>,
    cipher: AeadCipher,
}

impl LocalKms {
    /// Create an empty provider using AES-256-GCM
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty provider using the given cipher for new wraps
    pub fn with_cipher(cipher: AeadCipher) -> Self {
        Self {
            master_keys: RwLock::new(HashMap::new()),
            cipher,
        }
    }

    /// Register (or replace) a master key under `key_ref`
    pub fn add_master_key(&self, key_ref: impl Into<String>, key: DataKey) {
        self.master_keys.write().insert(key_ref.into(), key);
    }

    /// Generate and register a fresh master key
    pub fn generate_master_key(&self, key_ref: impl Into<String>) {
        self.add_master_key(key_ref, DataKey::generate());
    }

    /// Remove a master key; later requests against it are denied
    pub fn revoke(&self, key_ref: &str) -> bool {
        self.master_keys.write().remove(key_ref).is_some()
    }

    /// Build a provider from hex-encoded master keys
    pub fn from_hex_keys<I, K, V>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let kms = Self::new();
        for (key_ref, hex_key) in keys {
            kms.add_master_key(key_ref, DataKey::from_hex(hex_key.as_ref())?);
        }
        Ok(kms)
    }

    fn master_key(&self, key_ref: &str) -> Result<DataKey> {
        self.master_keys
            .read()
            .get(key_ref)
            .cloned()
            .ok_or_else(|| CryptoError::KeyManagementDenied(format!("unknown master key '{}'", key_ref)))
    }
}

#[async_trait]
impl KeyManagementProvider for LocalKms {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn encrypt(&self, key_ref: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let master = self.master_key(key_ref)?;
        let nonce = Nonce::generate();
        let ciphertext = Aead::new(&master, self.cipher).encrypt(&nonce, plaintext, key_ref.as_bytes())?;

        let mut out = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
        out.push(self.cipher.to_byte());
        out.extend_from_slice(nonce.as_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    async fn decrypt(&self, key_ref: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let master = self.master_key(key_ref)?;

        let (&cipher_id, rest) = ciphertext
            .split_first()
            .ok_or_else(|| CryptoError::CorruptEnvelope("empty wrapped key".into()))?;
        let cipher = AeadCipher::from_byte(cipher_id)
            .ok_or_else(|| CryptoError::CorruptEnvelope(format!("unknown cipher id {}", cipher_id)))?;
        if rest.len() < NONCE_SIZE + cipher.tag_size() {
            return Err(CryptoError::CorruptEnvelope(format!(
                "wrapped key too short: {} bytes",
                ciphertext.len()
            )));
        }

        let (nonce, body) = rest.split_at(NONCE_SIZE);
        let nonce = Nonce::from_bytes(nonce)?;
        Aead::new(&master, cipher).decrypt(&nonce, body, key_ref.as_bytes())
    }
}
