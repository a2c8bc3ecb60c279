//! Hierarchical folder view over a storage engine
//!
//! A [`Folder`] is a `(engine, root)` pair. It owns no objects and holds no
//! locks; cloning one is cheap and clones may be used from any task. All
//! names passed to a folder are relative to its root. A leading separator is
//! stripped, so a name can never address keys outside the root.

use backstow_storage::{
    path::{self, Child},
    ObjectMeta, ObjectReader, Result, StorageEngine, StorageError,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Deletes issued concurrently by [`Folder::delete_objects`]
const DELETE_CONCURRENCY: usize = 16;

/// Name and metadata of an object, relative to the folder that listed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Name relative to the listing folder
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
}

impl ObjectInfo {
    fn new(name: impl Into<String>, meta: &ObjectMeta) -> Self {
        Self {
            name: name.into(),
            size: meta.size,
            last_modified: meta.last_modified,
        }
    }
}

/// Identity token of a folder: a function of backend kind and root path only
///
/// Stable across processes for the same configuration. It is not a content
/// checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FolderHash(pub u64);

impl FolderHash {
    /// Compute the hash of a `(kind, root)` pair
    pub fn of(kind: &str, root: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_bytes());
        hasher.update(&[0]);
        hasher.update(root.as_bytes());
        let digest = hasher.finalize();

        let mut out = [0u8; 8];
        out.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_le_bytes(out))
    }
}

impl fmt::Display for FolderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A hierarchical view over one storage engine, rooted at a path prefix
#[derive(Clone)]
pub struct Folder {
    engine: Arc<dyn StorageEngine>,
    root: String,
}

impl fmt::Debug for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Folder")
            .field("kind", &self.engine.kind())
            .field("root", &self.root)
            .finish()
    }
}

impl Folder {
    /// Create a folder over `engine` rooted at `root`
    pub fn new(engine: Arc<dyn StorageEngine>, root: &str) -> Self {
        Self {
            engine,
            root: path::normalize_dir(root),
        }
    }

    /// Normalized root path: empty, or ending with exactly one `/`
    pub fn get_path(&self) -> &str {
        &self.root
    }

    /// Backend kind of the underlying engine
    pub fn kind(&self) -> &'static str {
        self.engine.kind()
    }

    /// The shared engine
    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// Identity hash over `(kind, root)`
    pub fn hash(&self) -> FolderHash {
        FolderHash::of(self.engine.kind(), &self.root)
    }

    /// A view rooted at `relative` below this folder; never touches the backend
    pub fn get_sub_folder(&self, relative: &str) -> Folder {
        Folder {
            engine: Arc::clone(&self.engine),
            root: path::join_dir(&self.root, relative),
        }
    }

    /// Absolute key for an object name
    fn key(&self, name: &str) -> Result<String> {
        if name.ends_with(path::SEPARATOR) {
            return Err(StorageError::InvalidPath(format!(
                "object name '{}' ends with a separator",
                name
            )));
        }
        let key = path::join(&self.root, name);
        if path::relative_to(&self.root, &key).map_or(true, str::is_empty) {
            return Err(StorageError::InvalidPath(format!("empty object name '{}'", name)));
        }
        Ok(key)
    }

    /// Whether an object exists; absence is not an error
    #[instrument(skip(self), fields(root = %self.root))]
    pub async fn exists(&self, name: &str) -> Result<bool> {
        let key = self.key(name)?;
        Ok(self.engine.head(&key).await?.is_some())
    }

    /// Metadata of one object, or `None` when absent
    pub async fn object_info(&self, name: &str) -> Result<Option<ObjectInfo>> {
        let key = self.key(name)?;
        Ok(self
            .engine
            .head(&key)
            .await?
            .map(|meta| ObjectInfo::new(path::join("", name), &meta)))
    }

    /// Direct objects and immediate sub-folders of this folder
    ///
    /// Every key under the root lands in exactly one of the two sequences.
    /// Objects are sorted by name; sub-folders by path.
    #[instrument(skip(self), fields(root = %self.root))]
    pub async fn list_folder(&self) -> Result<(Vec<ObjectInfo>, Vec<Folder>)> {
        let mut objects = Vec::new();
        let mut folder_names = BTreeSet::new();
        let root = self.root.as_str();

        self.engine
            .range(root, &mut |key, meta| {
                match path::relative_to(root, key).and_then(path::classify) {
                    Some(Child::Object(name)) => objects.push(ObjectInfo::new(name, meta)),
                    Some(Child::Folder(name)) => {
                        folder_names.insert(name.to_string());
                    }
                    None => {}
                }
                true
            })
            .await?;

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        let sub_folders = folder_names
            .iter()
            .map(|name| self.get_sub_folder(name))
            .collect::<Vec<_>>();

        debug!(objects = objects.len(), sub_folders = sub_folders.len(), "listed folder");
        Ok((objects, sub_folders))
    }

    /// Every object below this folder, named relative to it
    #[instrument(skip(self), fields(root = %self.root))]
    pub async fn list_folder_recursive(&self) -> Result<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let root = self.root.as_str();

        self.engine
            .range(root, &mut |key, meta| {
                if let Some(rest) = path::relative_to(root, key) {
                    let name = rest.trim_start_matches(path::SEPARATOR);
                    if !name.is_empty() {
                        objects.push(ObjectInfo::new(name, meta));
                    }
                }
                true
            })
            .await?;

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    /// Open an object for reading from offset 0
    #[instrument(skip(self), fields(root = %self.root))]
    pub async fn read_object(&self, name: &str) -> Result<ObjectReader> {
        let key = self.key(name)?;
        self.engine
            .open(&key)
            .await?
            .ok_or_else(|| StorageError::ObjectNotFound(key.clone()))
    }

    /// Read a whole object into memory
    pub async fn read_object_bytes(&self, name: &str) -> Result<Bytes> {
        let key = self.key(name)?;
        self.engine
            .load(&key)
            .await?
            .map(|object| object.data)
            .ok_or_else(|| StorageError::ObjectNotFound(key.clone()))
    }

    /// Write an object from a byte stream
    ///
    /// The stream is fully read before the write is committed; the object
    /// becomes visible in one step.
    #[instrument(skip(self, content), fields(root = %self.root))]
    pub async fn put_object<R>(&self, name: &str, content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let key = self.key(name)?;
        let data = materialize(content).await?;
        self.commit(&key, data).await
    }

    /// Write an object from an in-memory buffer
    pub async fn put_object_bytes(&self, name: &str, content: impl Into<Bytes>) -> Result<()> {
        let key = self.key(name)?;
        self.commit(&key, content.into()).await
    }

    /// Write an object, aborting if `cancel` fires first
    ///
    /// Cancellation interrupts both the read of `content` and the engine
    /// write. Engine writes are atomic: after a cancelled commit the key holds
    /// either the previous value (or absence) or the complete new value.
    #[instrument(skip(self, content, cancel), fields(root = %self.root))]
    pub async fn put_object_with_cancel<R>(
        &self,
        name: &str,
        content: R,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let key = self.key(name)?;
        let data = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(key = %key, "write cancelled while reading content");
                return Err(StorageError::Cancelled);
            }
            data = materialize(content) => data?,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(key = %key, "write cancelled during commit");
                Err(StorageError::Cancelled)
            }
            result = self.commit(&key, data) => result,
        }
    }

    /// Write an object, aborting if `deadline` passes first
    ///
    /// The deadline bounds the engine write as well as the read of
    /// `content`, with the same atomicity as [`Folder::put_object_with_cancel`].
    #[instrument(skip(self, content), fields(root = %self.root))]
    pub async fn put_object_with_deadline<R>(
        &self,
        name: &str,
        content: R,
        deadline: Instant,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let key = self.key(name)?;
        let expired = |stage: &str| {
            warn!(key = %key, stage, "deadline passed");
            StorageError::DeadlineExceeded
        };

        let data = tokio::time::timeout_at(deadline, materialize(content))
            .await
            .map_err(|_| expired("reading content"))??;
        if Instant::now() >= deadline {
            return Err(expired("reading content"));
        }

        tokio::time::timeout_at(deadline, self.commit(&key, data))
            .await
            .map_err(|_| expired("commit"))?
    }

    async fn commit(&self, key: &str, data: Bytes) -> Result<()> {
        let size = data.len();
        self.engine.store(key, data).await?;
        debug!(key, size, "stored object");
        Ok(())
    }

    /// Delete objects by name, best effort
    ///
    /// Every name is attempted. Names that could not be deleted are reported
    /// together in [`StorageError::PartialDeleteFailure`]; the others stay
    /// deleted.
    #[instrument(skip(self, names), fields(root = %self.root, count = names.len()))]
    pub async fn delete_objects<S>(&self, names: &[S]) -> Result<()>
    where
        S: AsRef<str> + Sync,
    {
        let failed: Vec<(String, String)> = stream::iter(names.iter().map(AsRef::<str>::as_ref))
            .map(|name| async move {
                let outcome = match self.key(name) {
                    Ok(key) => self.engine.delete(&key).await,
                    Err(e) => Err(e),
                };
                (name, outcome)
            })
            .buffer_unordered(DELETE_CONCURRENCY)
            .filter_map(|(name, outcome)| async move {
                outcome.err().map(|e| (name.to_string(), e.to_string()))
            })
            .collect()
            .await;

        if failed.is_empty() {
            Ok(())
        } else {
            warn!(failed = failed.len(), "bulk delete partially failed");
            Err(StorageError::PartialDeleteFailure { failed })
        }
    }

    /// Copy `src` to `dst`, overwriting `dst`
    #[instrument(skip(self), fields(root = %self.root))]
    pub async fn copy_object(&self, src: &str, dst: &str) -> Result<()> {
        let src_key = self.key(src)?;
        let dst_key = self.key(dst)?;
        self.engine.copy(&src_key, &dst_key).await
    }
}

async fn materialize<R: AsyncRead + Unpin>(mut content: R) -> Result<Bytes> {
    let mut buf = Vec::new();
    content.read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}
