//! Safety checks for restoring into a live database data directory
//!
//! These operate directly on the local filesystem, not through a
//! [`Folder`](crate::Folder), and are blocking. Run them from
//! `spawn_blocking` when called inside an async task.
//!
//! Top-level entries matching the protected pattern (by default
//! `lost+found`) are never removed and never count as content.

use crate::{CoreError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Entries that survive every purge
pub const DEFAULT_PROTECTED_PATTERN: &str = r"^lost\+found$";

/// Guards destructive operations on one data directory
#[derive(Debug, Clone)]
pub struct DataDirGuard {
    root: PathBuf,
    protected: Regex,
}

impl DataDirGuard {
    /// Guard `root` with the default protected pattern
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_protected(root, DEFAULT_PROTECTED_PATTERN)
    }

    /// Guard `root`, protecting top-level names matching `pattern`
    pub fn with_protected(root: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        let protected = Regex::new(pattern).map_err(|e| {
            CoreError::Configuration(format!("invalid protected pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            root: root.into(),
            protected,
        })
    }

    /// Guarded directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_protected(&self, name: &str) -> bool {
        self.protected.is_match(name)
    }

    /// Whether the quiescence marker (e.g. a lock file) is empty
    ///
    /// A missing marker counts as empty.
    pub fn is_quiescence_marker_empty(&self, marker: impl AsRef<Path>) -> Result<bool> {
        let path = self.root.join(marker);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "quiescence marker is missing");
                Ok(true)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fail unless the quiescence marker is empty
    pub fn ensure_quiescent(&self, marker: impl AsRef<Path>) -> Result<()> {
        let marker = marker.as_ref();
        if self.is_quiescence_marker_empty(marker)? {
            Ok(())
        } else {
            Err(CoreError::GuardViolation(format!(
                "{} is not empty; is the database still running?",
                self.root.join(marker).display()
            )))
        }
    }

    /// Remove every top-level entry that is neither protected nor in `keep_names`
    ///
    /// Returns how many entries were removed.
    pub fn purge_except<I, S>(&self, keep_names: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keep: HashSet<String> = keep_names.into_iter().map(|s| s.as_ref().to_string()).collect();

        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_protected(&name) || keep.contains(&name) {
                debug!(name = %name, "keeping entry");
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            info!(path = %path.display(), "removed");
            removed += 1;
        }

        if removed == 0 {
            warn!(root = %self.root.display(), "nothing to purge, directory is already empty");
        }
        Ok(removed)
    }

    /// Remove every file whose `/`-prefixed relative path is not listed
    ///
    /// Directories are kept. Used after a partial restore to drop files the
    /// backup manifest does not account for.
    pub fn purge_except_manifest<I, S>(&self, keep_relative_paths: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keep: HashSet<String> = keep_relative_paths
            .into_iter()
            .map(|p| manifest_path(p.as_ref()))
            .collect();

        let mut excess = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && self.is_protected(&e.file_name().to_string_lossy())));
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| CoreError::GuardViolation(e.to_string()))?;
            let key = manifest_path(&relative.to_string_lossy());
            if !keep.contains(&key) {
                excess.push(entry.into_path());
            }
        }

        for path in &excess {
            fs::remove_file(path)?;
            debug!(path = %path.display(), "removed file missing from manifest");
        }
        info!(removed = excess.len(), "purged files outside the manifest");
        Ok(())
    }

    /// Fail unless the directory holds nothing but protected entries
    pub fn require_empty(&self) -> Result<()> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !self.is_protected(&name) {
                found.push(name);
            }
        }

        if found.is_empty() {
            return Ok(());
        }
        found.sort();
        Err(CoreError::GuardViolation(format!(
            "{} is not empty: {}",
            self.root.display(),
            found.join(", ")
        )))
    }
}

fn manifest_path(relative: &str) -> String {
    let segments: Vec<&str> = relative
        .split(|c: char| c == '/' || c == std::path::MAIN_SEPARATOR)
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}
