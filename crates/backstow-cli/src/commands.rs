//! Subcommands

use crate::{
    config::BackstowConfig,
    output::{CliOutput, FolderListing, KeyReport},
};
use anyhow::{bail, Context};
use backstow_core::{BackupKeyring, Folder};
use backstow_crypto::DataKey;
use backstow_storage::StorageError;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Object and key operations against the configured backend
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List a folder
    Ls {
        /// Folder path relative to the storage root
        #[arg(default_value = "")]
        path: String,

        /// List every object below the folder
        #[arg(short, long)]
        recursive: bool,
    },

    /// Download an object
    Get {
        /// Object path
        path: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload an object
    Put {
        /// Object path
        path: String,

        /// Read from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Delete objects
    Rm {
        /// Object paths
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Copy an object
    Cp {
        /// Source object path
        src: String,

        /// Destination object path
        dst: String,
    },

    /// Manage backup data keys
    #[command(subcommand)]
    Key(KeyCommand),
}

/// Data key operations
#[derive(Subcommand, Debug, Clone)]
pub enum KeyCommand {
    /// Generate a data key for a backup folder and store it wrapped
    Seal {
        /// Backup folder path
        folder: String,
    },

    /// Unwrap the data key of a backup folder
    Open {
        /// Backup folder path
        folder: String,
    },
}

/// Run `command` against `root`
pub async fn execute(
    command: Command,
    root: &Folder,
    config: &BackstowConfig,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Command::Ls { path, recursive } => list(root, &path, recursive).await?.print_output(json),
        Command::Get { path, output } => get(root, &path, output.as_deref()).await,
        Command::Put { path, input } => put(root, &path, input.as_deref()).await,
        Command::Rm { paths } => remove(root, &paths).await,
        Command::Cp { src, dst } => {
            root.copy_object(&src, &dst)
                .await
                .with_context(|| format!("failed to copy {} to {}", src, dst))?;
            info!(%src, %dst, "copied");
            Ok(())
        }
        Command::Key(key_command) => {
            let keyring = config.keyring()?;
            key(root, &keyring, key_command).await?.print_output(json)
        }
    }
}

/// Build the listing for `ls`
pub async fn list(root: &Folder, path: &str, recursive: bool) -> anyhow::Result<FolderListing> {
    let folder = root.get_sub_folder(path);
    let listing = if recursive {
        let objects = folder.list_folder_recursive().await?;
        FolderListing::new(&folder, objects, &[])
    } else {
        let (objects, sub_folders) = folder.list_folder().await?;
        FolderListing::new(&folder, objects, &sub_folders)
    };
    Ok(listing)
}

async fn get(root: &Folder, path: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let mut reader = root
        .read_object(path)
        .await
        .with_context(|| format!("failed to read {}", path))?;

    let written = match output {
        Some(file) => {
            let mut out = tokio::fs::File::create(file)
                .await
                .with_context(|| format!("failed to create {}", file.display()))?;
            let n = tokio::io::copy(&mut reader, &mut out).await?;
            out.flush().await?;
            n
        }
        None => {
            let mut out = tokio::io::stdout();
            let n = tokio::io::copy(&mut reader, &mut out).await?;
            out.flush().await?;
            n
        }
    };
    info!(path, bytes = written, "downloaded");
    Ok(())
}

async fn put(root: &Folder, path: &str, input: Option<&Path>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, aborting upload");
                cancel.cancel();
            }
        })
    };

    let result = match input {
        Some(file) => {
            let reader = tokio::fs::File::open(file)
                .await
                .with_context(|| format!("failed to open {}", file.display()))?;
            root.put_object_with_cancel(path, reader, &cancel).await
        }
        None => root.put_object_with_cancel(path, tokio::io::stdin(), &cancel).await,
    };
    interrupt.abort();

    result.with_context(|| format!("failed to upload {}", path))?;
    info!(path, "uploaded");
    Ok(())
}

async fn remove(root: &Folder, paths: &[String]) -> anyhow::Result<()> {
    match root.delete_objects(paths).await {
        Ok(()) => {
            info!(count = paths.len(), "deleted");
            Ok(())
        }
        Err(StorageError::PartialDeleteFailure { failed }) => {
            for (path, reason) in &failed {
                eprintln!("failed to delete {}: {}", path, reason);
            }
            bail!("{} of {} deletions failed", failed.len(), paths.len())
        }
        Err(e) => Err(e.into()),
    }
}

/// Run a `key` subcommand
pub async fn key(
    root: &Folder,
    keyring: &BackupKeyring,
    command: KeyCommand,
) -> anyhow::Result<KeyReport> {
    let (path, data_key) = match command {
        KeyCommand::Seal { folder } => {
            let backup = root.get_sub_folder(&folder);
            let key = keyring
                .seal(&backup)
                .await
                .with_context(|| format!("failed to seal data key in {}", backup.get_path()))?;
            (backup.get_path().to_string(), key)
        }
        KeyCommand::Open { folder } => {
            let backup = root.get_sub_folder(&folder);
            let key = keyring
                .open(&backup)
                .await
                .with_context(|| format!("failed to open data key in {}", backup.get_path()))?;
            (backup.get_path().to_string(), key)
        }
    };

    Ok(KeyReport {
        folder: path,
        master_key_ref: keyring.master_key_ref().to_string(),
        fingerprint: fingerprint(&data_key),
    })
}

fn fingerprint(key: &DataKey) -> String {
    let digest = blake3::hash(key.as_bytes());
    hex::encode(&digest.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use backstow_crypto::{EnvelopeCipher, LocalKms};
    use backstow_storage::MemoryEngine;
    use std::sync::Arc;

    fn root() -> Folder {
        Folder::new(Arc::new(MemoryEngine::new()), "")
    }

    #[tokio::test]
    async fn test_put_get_files() {
        let root = root();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");
        std::fs::write(&input, br#"{"id":"x"}"#).unwrap();

        put(&root, "backups/b1.json", Some(input.as_path())).await.unwrap();
        get(&root, "backups/b1.json", Some(output.as_path())).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), br#"{"id":"x"}"#);

        assert!(get(&root, "backups/none", Some(output.as_path())).await.is_err());
    }

    #[tokio::test]
    async fn test_list_modes() {
        let root = root();
        root.put_object_bytes("backups/b1.json", "{}").await.unwrap();
        root.put_object_bytes("backups/wal/0001", "w").await.unwrap();

        let listing = list(&root, "backups", false).await.unwrap();
        assert_eq!(listing.path, "backups/");
        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.sub_folders, vec!["backups/wal/"]);

        let listing = list(&root, "backups", true).await.unwrap();
        let names: Vec<_> = listing.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["b1.json", "wal/0001"]);
        assert!(listing.sub_folders.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_remove_and_copy() {
        let root = root();
        let config = BackstowConfig::default();
        root.put_object_bytes("a", "1").await.unwrap();

        execute(
            Command::Cp {
                src: "a".into(),
                dst: "b".into(),
            },
            &root,
            &config,
            false,
        )
        .await
        .unwrap();
        assert!(root.exists("b").await.unwrap());

        remove(&root, &["a".to_string(), "b".to_string()]).await.unwrap();
        assert!(!root.exists("a").await.unwrap());

        let err = remove(&root, &["".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("1 of 1"));
    }

    #[tokio::test]
    async fn test_key_seal_then_open() {
        let root = root();
        let kms = LocalKms::new();
        kms.generate_master_key("backup-master");
        let keyring = BackupKeyring::new(EnvelopeCipher::new(Arc::new(kms)), "backup-master");

        let sealed = key(
            &root,
            &keyring,
            KeyCommand::Seal {
                folder: "basebackups/b1".into(),
            },
        )
        .await
        .unwrap();
        let opened = key(
            &root,
            &keyring,
            KeyCommand::Open {
                folder: "basebackups/b1".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(sealed.folder, "basebackups/b1/");
        assert_eq!(sealed.fingerprint, opened.fingerprint);
        assert_eq!(sealed.fingerprint.len(), 16);

        let missing = key(
            &root,
            &keyring,
            KeyCommand::Open {
                folder: "basebackups/none".into(),
            },
        )
        .await;
        assert!(missing.is_err());
    }
}
