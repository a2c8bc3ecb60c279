//! Local filesystem storage engine
//!
//! Keys map onto files below a root directory, one directory level per key
//! segment. Writes land in a hidden staging directory first and are renamed
//! into place, so a reader either opens the previous file or the complete
//! new one.

use crate::{
    path,
    ObjectMeta, ObjectReader, RangeVisitor, Result, StorageEngine, StorageError, StoredObject,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

/// Directory under the root holding in-flight writes; never listed
pub const STAGING_DIR: &str = ".backstow-staging";

/// A storage engine over a local directory tree
#[derive(Clone, Debug)]
pub struct FsEngine {
    root: Arc<PathBuf>,
}

impl FsEngine {
    /// Open (creating if needed) an engine rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        fs::create_dir_all(root.join(STAGING_DIR))?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a file path, refusing segments that would leave the root
    fn file_path(&self, key: &str) -> Result<PathBuf> {
        let mut full = PathBuf::from(self.root.as_ref());
        let mut any = false;
        for segment in path::segments(key) {
            if segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StorageError::InvalidPath(format!(
                    "segment '{}' in '{}' is not allowed on the filesystem backend",
                    segment, key
                )));
            }
            if !any && segment == STAGING_DIR {
                return Err(StorageError::InvalidPath(format!("'{}' is reserved", STAGING_DIR)));
            }
            full.push(segment);
            any = true;
        }
        if !any {
            return Err(StorageError::InvalidPath("empty key".into()));
        }
        Ok(full)
    }

    fn staging_path(&self) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(format!("{}.tmp", uuid::Uuid::new_v4()))
    }
}

fn meta_from(metadata: &fs::Metadata) -> ObjectMeta {
    let last_modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    ObjectMeta {
        size: metadata.len(),
        last_modified,
    }
}

fn is_not_found(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}

/// Whether `target` is a regular file; absent paths and directories are not
fn is_object_file(target: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(target) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn unavailable(context: &str, target: &Path, e: io::Error) -> StorageError {
    StorageError::BackendUnavailable(format!("{} '{}': {}", context, target.display(), e))
}

/// Write `data` to a staging file and rename it over `target`
fn write_atomic(staging: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let result = (|| {
        let mut file = fs::File::create(staging)?;
        file.write_all(data)?;
        file.sync_all()?;
        match fs::rename(staging, target) {
            // parent pruned by a concurrent delete
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::rename(staging, target)
            }
            other => other,
        }
    })();
    if result.is_err() {
        let _ = fs::remove_file(staging);
    }
    result
}

/// Remove now-empty directories from `dir` up to (not including) `root`
fn prune_empty_dirs(root: &Path, mut dir: Option<&Path>) {
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

#[async_trait]
impl StorageEngine for FsEngine {
    fn kind(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self))]
    async fn load(&self, key: &str) -> Result<Option<StoredObject>> {
        let target = self.file_path(key)?;
        tokio::task::spawn_blocking(move || {
            let mut file = match fs::File::open(&target) {
                Ok(file) => file,
                Err(e) if is_not_found(&e) => return Ok(None),
                Err(e) => return Err(unavailable("open", &target, e)),
            };
            let metadata = file.metadata().map_err(|e| unavailable("stat", &target, e))?;
            if !metadata.is_file() {
                return Ok(None);
            }
            let mut data = Vec::with_capacity(metadata.len() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| unavailable("read", &target, e))?;
            let mut meta = meta_from(&metadata);
            meta.size = data.len() as u64;
            Ok(Some(StoredObject {
                data: Bytes::from(data),
                meta,
            }))
        })
        .await?
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn store(&self, key: &str, data: Bytes) -> Result<()> {
        let target = self.file_path(key)?;
        let staging = self.staging_path();
        tokio::task::spawn_blocking(move || {
            write_atomic(&staging, &target, &data).map_err(|e| unavailable("write", &target, e))
        })
        .await??;
        debug!("stored object");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        let target = self.file_path(key)?;
        let root = Arc::clone(&self.root);
        tokio::task::spawn_blocking(move || {
            // a directory is a folder, not an object
            if !is_object_file(&target).map_err(|e| unavailable("stat", &target, e))? {
                return Ok(());
            }
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if is_not_found(&e) => return Ok(()),
                Err(e) => return Err(unavailable("remove", &target, e)),
            }
            prune_empty_dirs(&root, target.parent());
            Ok(())
        })
        .await?
    }

    async fn range(&self, prefix: &str, visit: &mut RangeVisitor<'_>) -> Result<()> {
        let root = Arc::clone(&self.root);
        let prefix = prefix.to_string();

        let entries = tokio::task::spawn_blocking(move || -> Result<Vec<(String, ObjectMeta)>> {
            let start = root.join(path::dir_prefix(&prefix));
            let staging_dir = root.join(STAGING_DIR);
            let mut entries = Vec::new();
            let walker = WalkDir::new(&start)
                .min_depth(1)
                .into_iter()
                .filter_entry(|e| e.path() != staging_dir);

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.io_error().map(is_not_found).unwrap_or(false) => continue,
                    Err(e) => return Err(e.into()),
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(root.as_path()) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if !key.starts_with(&prefix) {
                    continue;
                }
                match entry.metadata() {
                    Ok(metadata) => entries.push((key, meta_from(&metadata))),
                    Err(e) if e.io_error().map(is_not_found).unwrap_or(false) => {
                        warn!(key = %key, "object vanished during listing");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(entries)
        })
        .await??;

        for (key, meta) in &entries {
            if !visit(key, meta) {
                break;
            }
        }
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let target = self.file_path(key)?;
        match tokio::fs::metadata(&target).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(meta_from(&metadata))),
            Ok(_) => Ok(None),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(unavailable("stat", &target, e)),
        }
    }

    async fn open(&self, key: &str) -> Result<Option<ObjectReader>> {
        let target = self.file_path(key)?;
        match tokio::fs::File::open(&target).await {
            Ok(file) => {
                let metadata = file.metadata().await.map_err(|e| unavailable("stat", &target, e))?;
                if !metadata.is_file() {
                    return Ok(None);
                }
                Ok(Some(Box::pin(file) as ObjectReader))
            }
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(unavailable("open", &target, e)),
        }
    }

    #[instrument(skip(self))]
    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let source = self.file_path(src)?;
        let target = self.file_path(dst)?;
        let staging = self.staging_path();
        let src = src.to_string();
        tokio::task::spawn_blocking(move || {
            if !is_object_file(&source).map_err(|e| unavailable("stat", &source, e))? {
                return Err(StorageError::ObjectNotFound(src));
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| unavailable("mkdir", parent, e))?;
            }
            match fs::copy(&source, &staging) {
                Ok(_) => {}
                Err(e) if is_not_found(&e) => {
                    let _ = fs::remove_file(&staging);
                    return Err(StorageError::ObjectNotFound(src));
                }
                Err(e) => {
                    let _ = fs::remove_file(&staging);
                    return Err(unavailable("copy", &source, e));
                }
            }
            fs::rename(&staging, &target).map_err(|e| {
                let _ = fs::remove_file(&staging);
                unavailable("rename", &target, e)
            })
        })
        .await?
    }
}
