//! Wrapped data-key persistence
//!
//! A backup's data key is stored only in wrapped form, as one framed object
//! named [`WRAPPED_KEY_OBJECT_NAME`] inside the backup's metadata folder.

use crate::{Folder, Result};
use backstow_crypto::{framing, DataKey, EnvelopeCipher, WrappedKey};
use backstow_storage::StorageError;
use tracing::{debug, info, instrument};

/// Object name of the framed wrapped key
pub const WRAPPED_KEY_OBJECT_NAME: &str = "envelope_key";

/// Persist `key` into `folder`, replacing any previous one
#[instrument(skip(folder, key), fields(root = folder.get_path()))]
pub async fn store_wrapped_key(folder: &Folder, key: &WrappedKey) -> Result<()> {
    folder
        .put_object_bytes(WRAPPED_KEY_OBJECT_NAME, framing::serialize(key)?)
        .await?;
    Ok(())
}

/// Load the wrapped key from `folder`; `None` when none was stored
#[instrument(skip(folder), fields(root = folder.get_path()))]
pub async fn load_wrapped_key(folder: &Folder) -> Result<Option<WrappedKey>> {
    let mut reader = match folder.read_object(WRAPPED_KEY_OBJECT_NAME).await {
        Ok(reader) => reader,
        Err(e) if e.is_not_found() => {
            debug!("no wrapped key in folder");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Some(framing::read_framed_async(&mut reader).await?))
}

/// Seals and opens per-backup data keys under one master key
#[derive(Clone, Debug)]
pub struct BackupKeyring {
    cipher: EnvelopeCipher,
    master_key_ref: String,
}

impl BackupKeyring {
    /// Create a keyring wrapping under `master_key_ref`
    pub fn new(cipher: EnvelopeCipher, master_key_ref: impl Into<String>) -> Self {
        Self {
            cipher,
            master_key_ref: master_key_ref.into(),
        }
    }

    /// Master key reference used for wrapping
    pub fn master_key_ref(&self) -> &str {
        &self.master_key_ref
    }

    /// Generate a fresh data key, wrap it and persist the wrapped form
    #[instrument(skip(self, folder), fields(root = folder.get_path(), master = %self.master_key_ref))]
    pub async fn seal(&self, folder: &Folder) -> Result<DataKey> {
        let (key, wrapped) = self.cipher.generate_data_key(&self.master_key_ref).await?;
        store_wrapped_key(folder, &wrapped).await?;
        info!(len = wrapped.len(), "sealed backup data key");
        Ok(key)
    }

    /// Load and unwrap the data key persisted in `folder`
    ///
    /// A missing key object is [`StorageError::ObjectNotFound`].
    #[instrument(skip(self, folder), fields(root = folder.get_path(), master = %self.master_key_ref))]
    pub async fn open(&self, folder: &Folder) -> Result<DataKey> {
        let wrapped = load_wrapped_key(folder).await?.ok_or_else(|| {
            StorageError::ObjectNotFound(format!("{}{}", folder.get_path(), WRAPPED_KEY_OBJECT_NAME))
        })?;
        Ok(self.cipher.unwrap(&wrapped, &self.master_key_ref).await?)
    }

    /// Re-wrap the data key in `folder` under another master key
    ///
    /// Returns a keyring bound to the new master key. The data key itself,
    /// and so every object encrypted with it, is unchanged.
    #[instrument(skip(self, folder), fields(root = folder.get_path(), from = %self.master_key_ref))]
    pub async fn rewrap(&self, folder: &Folder, new_master_key_ref: &str) -> Result<BackupKeyring> {
        let key = self.open(folder).await?;
        let wrapped = self.cipher.wrap(&key, new_master_key_ref).await?;
        store_wrapped_key(folder, &wrapped).await?;
        info!(to = new_master_key_ref, "re-wrapped backup data key");
        Ok(Self::new(self.cipher.clone(), new_master_key_ref))
    }
}
