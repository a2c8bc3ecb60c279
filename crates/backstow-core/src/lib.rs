//! # Backstow Core
//!
//! The uniform storage contract used by every Backstow backup and restore
//! pipeline.
//!
//! This crate provides:
//! - **Folder**: A hierarchical view over any storage engine
//! - **Configuration**: Backend and key-management records that build folders and ciphers
//! - **Keyring**: Persistence of wrapped per-backup data keys
//! - **Guards**: Safety checks before touching a live database data directory
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      Backup / restore orchestrators     │
//! ├───────────────────────┬─────────────────┤
//! │        Folder         │  BackupKeyring  │
//! ├───────────────────────┼─────────────────┤
//! │    StorageEngine      │ EnvelopeCipher  │
//! │  (backstow-storage)   │ (backstow-crypto)│
//! └───────────────────────┴─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use backstow_core::StorageConfig;
//!
//! let root = StorageConfig::Memory { root_prefix: "pg".into() }.open()?;
//! root.put_object_bytes("backups/b1.json", r#"{"id":"x"}"#).await?;
//! let (objects, sub_folders) = root.list_folder().await?;
//! ```

pub mod config;
pub mod error;
pub mod folder;
pub mod guard;
pub mod keyring;

pub use config::{KmsConfig, StorageConfig};
pub use error::{CoreError, Result};
pub use folder::{Folder, FolderHash, ObjectInfo};
pub use guard::DataDirGuard;
pub use keyring::{load_wrapped_key, store_wrapped_key, BackupKeyring, WRAPPED_KEY_OBJECT_NAME};
