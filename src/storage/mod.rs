//! Object storage for applicant photos and delivered archives
//! Uses Apache Arrow object_store crate, one backend per bucket

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{ObjectStore, path::Path as StoragePath};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{StorageConfig, StorageProvider};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("No storage backend for bucket '{0}'")]
    UnknownBucket(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

impl StorageError {
    /// Retrying will not change the outcome
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::UnknownBucket(_)
        )
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Object storage contract used by the packager and submitter
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Bytes>;

    async fn put(&self, bucket: &str, path: &str, data: Bytes) -> Result<UploadMetadata>;

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool>;
}

/// Transport-level retry applied to every storage call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

type BackendFactory =
    Arc<dyn Fn(&str) -> Result<Arc<dyn ObjectStore>> + Send + Sync + 'static>;

/// Storage client wrapping object_store, creating backends per bucket on demand
#[derive(Clone)]
pub struct StorageClient {
    backends: Arc<RwLock<HashMap<String, Arc<dyn ObjectStore>>>>,
    factory: BackendFactory,
    retry: RetryPolicy,
}

impl StorageClient {
    /// Create new storage client; `factory` builds the backend for a bucket
    pub fn new<F>(factory: F, retry: RetryPolicy) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn ObjectStore>> + Send + Sync + 'static,
    {
        Self {
            backends: Arc::new(RwLock::new(HashMap::new())),
            factory: Arc::new(factory),
            retry,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(
            |_| Ok(Arc::new(object_store::memory::InMemory::new()) as Arc<dyn ObjectStore>),
            RetryPolicy {
                max_retries: 1,
                backoff: Duration::ZERO,
            },
        )
    }

    /// Build a client for the configured provider
    pub fn from_config(config: &StorageConfig, retry: RetryPolicy) -> Result<Self> {
        let client = match config.provider {
            StorageProvider::Memory => Self {
                retry,
                ..Self::in_memory()
            },
            StorageProvider::Local => {
                let root = config.root.clone();
                Self::new(
                    move |bucket| {
                        let dir = root.join(bucket);
                        std::fs::create_dir_all(&dir).map_err(|e| {
                            StorageError::UploadFailed(format!(
                                "cannot create {}: {}",
                                dir.display(),
                                e
                            ))
                        })?;
                        let store = object_store::local::LocalFileSystem::new_with_prefix(dir)?;
                        Ok(Arc::new(store) as Arc<dyn ObjectStore>)
                    },
                    retry,
                )
            }
            StorageProvider::S3 => {
                let config = config.clone();
                Self::new(
                    move |bucket| {
                        let mut builder = object_store::aws::AmazonS3Builder::new()
                            .with_bucket_name(bucket);
                        if let Some(region) = &config.region {
                            builder = builder.with_region(region);
                        }
                        if let Some(endpoint) = &config.endpoint {
                            builder = builder.with_endpoint(endpoint).with_allow_http(true);
                        }
                        if let Some(access_key) = &config.access_key {
                            builder = builder.with_access_key_id(access_key);
                        }
                        if let Some(secret_key) = &config.secret_key {
                            builder = builder.with_secret_access_key(secret_key);
                        }
                        Ok(Arc::new(builder.build()?) as Arc<dyn ObjectStore>)
                    },
                    retry,
                )
            }
        };

        info!(provider = ?config.provider, "Storage client configured");
        Ok(client)
    }

    async fn backend(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if let Some(store) = self.backends.read().await.get(bucket) {
            return Ok(store.clone());
        }

        let mut backends = self.backends.write().await;
        if let Some(store) = backends.get(bucket) {
            return Ok(store.clone());
        }

        let store = (self.factory)(bucket)?;
        backends.insert(bucket.to_string(), store.clone());
        debug!(bucket, "Storage backend created");
        Ok(store)
    }

    async fn fetch_once(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let store = self.backend(bucket).await?;
        let location = StoragePath::from(path);

        match store.get(&location).await {
            Ok(result) => Ok(result.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_once(&self, bucket: &str, path: &str, data: Bytes) -> Result<UploadMetadata> {
        let store = self.backend(bucket).await?;
        let location = StoragePath::from(path);
        let size = data.len();

        let put_result = store.put(&location, data.into()).await?;

        Ok(UploadMetadata {
            bucket: bucket.to_string(),
            key: path.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    async fn backoff(&self, attempts: u32, operation: &str, bucket: &str, path: &str, error: &StorageError) {
        warn!(operation, bucket, path, attempts, error = %error, "Storage call failed, retrying");
        // Exponential backoff: base, 2x base, 4x base
        let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
        tokio::time::sleep(self.retry.backoff.saturating_mul(factor)).await;
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    /// Download with retry; missing objects fail immediately
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.fetch_once(bucket, path).await {
                Ok(bytes) => {
                    debug!(bucket, path, size = bytes.len(), "Downloaded from storage");
                    return Ok(bytes);
                }
                Err(e) if e.is_permanent() || attempts >= self.retry.max_retries => {
                    return Err(match e {
                        e if e.is_permanent() => e,
                        e => StorageError::DownloadFailed(format!(
                            "{bucket}/{path} failed after {attempts} attempts: {e}"
                        )),
                    });
                }
                Err(e) => self.backoff(attempts, "fetch", bucket, path, &e).await,
            }
        }
    }

    /// Upload with retry
    async fn put(&self, bucket: &str, path: &str, data: Bytes) -> Result<UploadMetadata> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            // Bytes clones share the buffer
            match self.put_once(bucket, path, data.clone()).await {
                Ok(meta) => {
                    info!(bucket, key = path, size = meta.size, "Uploaded to storage");
                    return Ok(meta);
                }
                Err(e) if e.is_permanent() || attempts >= self.retry.max_retries => {
                    return Err(StorageError::UploadFailed(format!(
                        "{bucket}/{path} failed after {attempts} attempts: {e}"
                    )));
                }
                Err(e) => self.backoff(attempts, "put", bucket, path, &e).await,
            }
        }
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        let store = self.backend(bucket).await?;
        let location = StoragePath::from(path);

        match store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
