//! # Backstow Crypto
//!
//! Envelope encryption for backup data keys.
//!
//! This crate provides:
//! - **Data keys**: Random 256-bit keys, zeroized on drop
//! - **Envelope cipher**: Wrap/unwrap data keys through a key-management provider
//! - **Framing**: The length-prefixed binary record a wrapped key is stored as
//! - **Providers**: An in-process AEAD provider and a REST KMS client
//!
//! ## Security Model
//!
//! - Master keys never leave the key-management provider
//! - Only wrapped data keys are persisted next to backup data
//! - A failed unwrap is always an error; no default key is ever substituted
//!
//! ## Example
//!
//! ```rust,ignore
//! use backstow_crypto::{EnvelopeCipher, LocalKms, framing};
//!
//! let kms = LocalKms::new();
//! kms.generate_master_key("backups");
//! let cipher = EnvelopeCipher::new(Arc::new(kms));
//!
//! let (data_key, wrapped) = cipher.generate_data_key("backups").await?;
//! let record = framing::serialize(&wrapped)?;
//! ```

pub mod envelope;
pub mod error;
pub mod framing;
pub mod keys;
pub mod kms;
pub mod symmetric;

pub use envelope::{EnvelopeCipher, WrappedKey};
pub use error::{CryptoError, Result};
pub use keys::{DataKey, KEY_SIZE, NONCE_SIZE};
pub use kms::{KeyManagementProvider, LocalKms, RestKms, RestKmsConfig};
pub use symmetric::{Aead, AeadCipher, Nonce};
