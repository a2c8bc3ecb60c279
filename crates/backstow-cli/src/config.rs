//! CLI configuration
//!
//! Sources, lowest precedence first: an optional `backstow.toml` (or the
//! file given with `--config`), then `BACKSTOW__*` environment variables
//! with `__` separating nested keys, e.g. `BACKSTOW__STORAGE__BACKEND=s3`.

use anyhow::Context;
use backstow_core::{BackupKeyring, Folder, KmsConfig, StorageConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_NAME: &str = "backstow";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BACKSTOW";

/// Top-level CLI configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BackstowConfig {
    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,
    /// Key-management provider, needed only by `key` commands
    #[serde(default)]
    pub kms: Option<KmsConfig>,
    /// Master key reference used to wrap data keys
    #[serde(default)]
    pub master_key_ref: Option<String>,
}

impl BackstowConfig {
    /// Load configuration from `path` (or the default file) and the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        settings
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Root folder of the configured backend
    pub fn open_root(&self) -> anyhow::Result<Folder> {
        self.storage.open().context("failed to open storage")
    }

    /// Keyring for `key` commands
    pub fn keyring(&self) -> anyhow::Result<BackupKeyring> {
        let kms = self
            .kms
            .as_ref()
            .context("no key-management provider configured (set [kms])")?;
        let master_key_ref = self
            .master_key_ref
            .as_deref()
            .context("no master key reference configured (set master_key_ref)")?;
        let cipher = kms.cipher().context("failed to set up key management")?;
        Ok(BackupKeyring::new(cipher, master_key_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backstow.toml");
        std::fs::write(
            &path,
            r#"
master_key_ref = "backup-master"

[storage]
backend = "filesystem"
root_prefix = "pg"
directory = "/var/lib/backstow"

[kms]
provider = "local"

[kms.master_keys]
backup-master = "0000000000000000000000000000000000000000000000000000000000000000"
"#,
        )
        .unwrap();

        let config = BackstowConfig::load(Some(&path)).unwrap();
        assert_eq!(config.storage.root_prefix(), "pg");
        assert!(matches!(config.storage, StorageConfig::Filesystem { .. }));
        assert_eq!(config.master_key_ref.as_deref(), Some("backup-master"));
        assert!(matches!(config.kms, Some(KmsConfig::Local { .. })));
        config.keyring().unwrap();
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BackstowConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_keyring_requires_kms() {
        let config = BackstowConfig::default();
        let err = config.keyring().unwrap_err();
        assert!(err.to_string().contains("key-management"));
    }
}
