//! Backend and key-management configuration records
//!
//! These are plain serde types. Loading them from files or the environment
//! is the binary's concern.

use crate::{CoreError, Folder, Result};
use backstow_crypto::{EnvelopeCipher, KeyManagementProvider, LocalKms, RestKms, RestKmsConfig};
use backstow_storage::{
    AzureSettings, CloudEngine, FsEngine, GcsSettings, MemoryEngine, S3Settings, StorageEngine,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Storage backend configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local memory; contents vanish on exit
    Memory {
        /// Root prefix for every key
        #[serde(default)]
        root_prefix: String,
    },
    /// A directory on the local filesystem
    Filesystem {
        /// Root prefix for every key
        #[serde(default)]
        root_prefix: String,
        /// Directory holding the objects
        directory: PathBuf,
    },
    /// Amazon S3 or an S3-compatible service
    S3 {
        /// Root prefix for every key
        #[serde(default)]
        root_prefix: String,
        /// Connection settings
        #[serde(flatten)]
        settings: S3Settings,
    },
    /// Google Cloud Storage
    Gcs {
        /// Root prefix for every key
        #[serde(default)]
        root_prefix: String,
        /// Connection settings
        #[serde(flatten)]
        settings: GcsSettings,
    },
    /// Azure Blob Storage
    Azure {
        /// Root prefix for every key
        #[serde(default)]
        root_prefix: String,
        /// Connection settings
        #[serde(flatten)]
        settings: AzureSettings,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory {
            root_prefix: String::new(),
        }
    }
}

impl StorageConfig {
    /// Root prefix of the configured backend
    pub fn root_prefix(&self) -> &str {
        match self {
            StorageConfig::Memory { root_prefix }
            | StorageConfig::Filesystem { root_prefix, .. }
            | StorageConfig::S3 { root_prefix, .. }
            | StorageConfig::Gcs { root_prefix, .. }
            | StorageConfig::Azure { root_prefix, .. } => root_prefix,
        }
    }

    /// Build the engine for this backend
    pub fn engine(&self) -> Result<Arc<dyn StorageEngine>> {
        let engine: Arc<dyn StorageEngine> = match self {
            StorageConfig::Memory { .. } => Arc::new(MemoryEngine::new()),
            StorageConfig::Filesystem { directory, .. } => Arc::new(FsEngine::new(directory.clone())?),
            StorageConfig::S3 { settings, .. } => Arc::new(CloudEngine::s3(settings)?),
            StorageConfig::Gcs { settings, .. } => Arc::new(CloudEngine::gcs(settings)?),
            StorageConfig::Azure { settings, .. } => Arc::new(CloudEngine::azure(settings)?),
        };
        Ok(engine)
    }

    /// Build the engine and return the root folder at `root_prefix`
    pub fn open(&self) -> Result<Folder> {
        let engine = self.engine()?;
        info!(kind = engine.kind(), root = self.root_prefix(), "opened storage");
        Ok(Folder::new(engine, self.root_prefix()))
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Key-management provider configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum KmsConfig {
    /// In-process master keys, hex encoded
    Local {
        /// key reference → 64 hex characters
        master_keys: HashMap<String, String>,
    },
    /// REST key-management service
    Rest {
        /// Base URL of the service
        endpoint: String,
        /// Bearer token
        token: String,
        /// Per-request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

impl KmsConfig {
    /// Build the provider
    pub fn provider(&self) -> Result<Arc<dyn KeyManagementProvider>> {
        let provider: Arc<dyn KeyManagementProvider> = match self {
            KmsConfig::Local { master_keys } => {
                if master_keys.is_empty() {
                    return Err(CoreError::Configuration(
                        "local key management needs at least one master key".into(),
                    ));
                }
                Arc::new(LocalKms::from_hex_keys(master_keys.iter().map(|(k, v)| (k.clone(), v)))?)
            }
            KmsConfig::Rest {
                endpoint,
                token,
                timeout_secs,
            } => {
                let config = RestKmsConfig::new(endpoint.clone(), token.clone())
                    .with_timeout(Duration::from_secs(*timeout_secs));
                Arc::new(RestKms::new(config)?)
            }
        };
        Ok(provider)
    }

    /// Build an envelope cipher over the provider
    pub fn cipher(&self) -> Result<EnvelopeCipher> {
        Ok(EnvelopeCipher::new(self.provider()?))
    }
}
