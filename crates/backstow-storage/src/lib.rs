//! # Backstow Storage
//!
//! Storage engines for the Backstow backup system.
//!
//! This crate provides:
//! - **Path model**: Pure functions mapping hierarchical paths onto flat keys
//! - **StorageEngine trait**: A concurrency-safe key → object store contract
//! - **Engines**: In-memory, local filesystem, and cloud object stores
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Folder (backstow-core)          │
//! ├─────────────────────────────────────────┤
//! │          StorageEngine Trait            │
//! ├─────────────┬─────────────┬─────────────┤
//! │ MemoryEngine│  FsEngine   │ CloudEngine │
//! ├─────────────┴─────────────┴─────────────┤
//! │   process memory │ disk │ S3/GCS/Azure  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Engines own all synchronization. Callers share one engine through an
//! `Arc` and never lock around it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use backstow_storage::{MemoryEngine, StorageEngine};
//!
//! let engine = MemoryEngine::new();
//! engine.store("backups/b1.json", Bytes::from_static(b"{}")).await?;
//! let object = engine.load("backups/b1.json").await?;
//! ```

pub mod cloud;
pub mod error;
pub mod fs;
pub mod memory;
pub mod path;

pub use cloud::{AzureSettings, CloudEngine, GcsSettings, S3Settings};
pub use error::{Result, StorageError};
pub use fs::FsEngine;
pub use memory::MemoryEngine;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::io::AsyncRead;

/// A readable object body positioned at offset 0
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Visitor passed to [`StorageEngine::range`]; return `false` to stop
pub type RangeVisitor<'a> = dyn FnMut(&str, &ObjectMeta) -> bool + Send + 'a;

/// Metadata about a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Size in bytes
    pub size: u64,
    /// Time of the write that produced this object
    pub last_modified: DateTime<Utc>,
}

/// A complete object as returned by [`StorageEngine::load`]
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Object body
    pub data: Bytes,
    /// Object metadata
    pub meta: ObjectMeta,
}

impl StoredObject {
    /// Wrap freshly written data, stamping it with the current time
    pub fn new(data: Bytes) -> Self {
        let meta = ObjectMeta {
            size: data.len() as u64,
            last_modified: Utc::now(),
        };
        Self { data, meta }
    }
}

/// Trait for storage engines
///
/// Keys are absolute, normalized paths as produced by [`path::join`].
/// All methods may be called concurrently from many tasks.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Backend kind, e.g. "memory" or "s3"; part of every folder hash
    fn kind(&self) -> &'static str;

    /// Load an object, or `None` when the key is absent
    async fn load(&self, path: &str) -> Result<Option<StoredObject>>;

    /// Store an object, replacing any previous value atomically
    async fn store(&self, path: &str, data: Bytes) -> Result<()>;

    /// Delete an object; deleting an absent key succeeds
    async fn delete(&self, path: &str) -> Result<()>;

    /// Visit every object whose key starts with `prefix` (empty = all).
    ///
    /// Order is unspecified. Entries modified during the traversal are seen
    /// either before or after the change, never torn.
    async fn range(&self, prefix: &str, visit: &mut RangeVisitor<'_>) -> Result<()>;

    /// Object metadata without the body
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        Ok(self.load(path).await?.map(|object| object.meta))
    }

    /// Open an object for streaming reads
    async fn open(&self, path: &str) -> Result<Option<ObjectReader>> {
        Ok(self
            .load(path)
            .await?
            .map(|object| Box::pin(std::io::Cursor::new(object.data)) as ObjectReader))
    }

    /// Copy `src` to `dst`, overwriting `dst`
    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let object = self
            .load(src)
            .await?
            .ok_or_else(|| StorageError::ObjectNotFound(src.to_string()))?;
        self.store(dst, object.data).await
    }
}
