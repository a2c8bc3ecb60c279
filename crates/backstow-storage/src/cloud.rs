//! Cloud object-store engine
//!
//! Adapts any [`object_store::ObjectStore`] (S3, GCS, Azure Blob, or the
//! in-process `InMemory` store used in tests) to the [`StorageEngine`]
//! contract. Listing consumes the SDK's paginated stream to completion and
//! surfaces the first page error instead of returning a short listing.

use crate::{
    path, ObjectMeta, ObjectReader, RangeVisitor, Result, StorageEngine, StorageError,
    StoredObject,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::{
    aws::AmazonS3Builder, azure::MicrosoftAzureBuilder, gcp::GoogleCloudStorageBuilder,
    memory::InMemory, path::Path as StorePath, ObjectStore, PutPayload,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::StreamReader;
use tracing::instrument;

/// Connection parameters for an S3-compatible bucket
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct S3Settings {
    /// Bucket name
    pub bucket: String,
    /// Region, e.g. "us-east-1"
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Access key id; falls back to the environment when absent
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret access key; falls back to the environment when absent
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Allow plain HTTP endpoints
    #[serde(default)]
    pub allow_http: bool,
}

/// Connection parameters for a Google Cloud Storage bucket
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GcsSettings {
    /// Bucket name
    pub bucket: String,
    /// Path to a service account JSON file
    #[serde(default)]
    pub service_account_path: Option<String>,
}

/// Connection parameters for an Azure Blob Storage container
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AzureSettings {
    /// Storage account name
    pub account: String,
    /// Container name
    pub container: String,
    /// Account access key; falls back to the environment when absent
    #[serde(default)]
    pub access_key: Option<String>,
}

/// A storage engine over a cloud object store
#[derive(Clone)]
pub struct CloudEngine {
    store: Arc<dyn ObjectStore>,
    kind: &'static str,
}

impl std::fmt::Debug for CloudEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudEngine")
            .field("kind", &self.kind)
            .field("store", &self.store.to_string())
            .finish()
    }
}

impl CloudEngine {
    /// Wrap an existing object store
    pub fn new(store: Arc<dyn ObjectStore>, kind: &'static str) -> Self {
        Self { store, kind }
    }

    /// An engine over an in-process object store, for tests
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "object-store-memory")
    }

    /// Connect to an S3-compatible bucket
    pub fn s3(settings: &S3Settings) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&settings.bucket)
            .with_allow_http(settings.allow_http);
        if let Some(region) = &settings.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key_id) = &settings.access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &settings.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        let store = builder
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(store), "s3"))
    }

    /// Connect to a Google Cloud Storage bucket
    pub fn gcs(settings: &GcsSettings) -> Result<Self> {
        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&settings.bucket);
        if let Some(path) = &settings.service_account_path {
            builder = builder.with_service_account_path(path);
        }
        let store = builder
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(store), "gcs"))
    }

    /// Connect to an Azure Blob Storage container
    pub fn azure(settings: &AzureSettings) -> Result<Self> {
        let mut builder = MicrosoftAzureBuilder::from_env()
            .with_account(&settings.account)
            .with_container_name(&settings.container);
        if let Some(key) = &settings.access_key {
            builder = builder.with_access_key(key);
        }
        let store = builder
            .build()
            .map_err(|e| StorageError::Configuration(e.to_string()))?;
        Ok(Self::new(Arc::new(store), "azure"))
    }
}

/// Object location for `key`, taken verbatim so listings echo it back unchanged
fn location(key: &str) -> Result<StorePath> {
    StorePath::parse(key).map_err(|e| {
        StorageError::InvalidPath(format!("'{}' is not a valid object store key: {}", key, e))
    })
}

fn convert_meta(meta: &object_store::ObjectMeta) -> ObjectMeta {
    ObjectMeta {
        size: meta.size as u64,
        last_modified: meta.last_modified,
    }
}

fn absent_as_none<T>(result: object_store::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(object_store::Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl StorageEngine for CloudEngine {
    fn kind(&self) -> &'static str {
        self.kind
    }

    #[instrument(skip(self), fields(kind = self.kind))]
    async fn load(&self, key: &str) -> Result<Option<StoredObject>> {
        let Some(result) = absent_as_none(self.store.get(&location(key)?).await)? else {
            return Ok(None);
        };
        let mut meta = convert_meta(&result.meta);
        let data = match result.bytes().await {
            Ok(data) => data,
            // deleted between the metadata response and the body read
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        meta.size = data.len() as u64;
        Ok(Some(StoredObject { data, meta }))
    }

    #[instrument(skip(self, data), fields(kind = self.kind, size = data.len()))]
    async fn store(&self, key: &str, data: Bytes) -> Result<()> {
        self.store.put(&location(key)?, PutPayload::from(data)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(kind = self.kind))]
    async fn delete(&self, key: &str) -> Result<()> {
        absent_as_none(self.store.delete(&location(key)?).await)?;
        Ok(())
    }

    async fn range(&self, prefix: &str, visit: &mut RangeVisitor<'_>) -> Result<()> {
        // object_store lists by whole segments; narrow to the exact prefix here
        let dir = path::dir_prefix(prefix).trim_end_matches(path::SEPARATOR);
        let list_prefix = if dir.is_empty() { None } else { Some(location(dir)?) };

        let mut listing = self.store.list(list_prefix.as_ref());
        while let Some(item) = listing.next().await {
            let meta = item?;
            let key = meta.location.as_ref();
            if !key.starts_with(prefix) {
                continue;
            }
            if !visit(key, &convert_meta(&meta)) {
                break;
            }
        }
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        Ok(absent_as_none(self.store.head(&location(key)?).await)?.map(|meta| convert_meta(&meta)))
    }

    async fn open(&self, key: &str) -> Result<Option<ObjectReader>> {
        let Some(result) = absent_as_none(self.store.get(&location(key)?).await)? else {
            return Ok(None);
        };
        let stream = result
            .into_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Some(Box::pin(StreamReader::new(stream)) as ObjectReader))
    }

    #[instrument(skip(self), fields(kind = self.kind))]
    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        match self.store.copy(&location(src)?, &location(dst)?).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::ObjectNotFound(src.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
