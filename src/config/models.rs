use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub certificate: CertificateConfig,
    #[serde(default)]
    pub photos: PhotoConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// GSS code -> electoral registration office name
    #[serde(default)]
    pub offices: BTreeMap<String, String>,
}

/// Process-level settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_fjall_path")]
    pub fjall_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            fjall_path: default_fjall_path(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_fjall_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

/// Scheduled batch job
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Maximum print requests per batch
    #[serde(default = "default_batch_size")]
    pub size: usize,
    /// Cron expression with a leading seconds field
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default = "default_lock_name")]
    pub lock_name: String,
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl: HumanDuration,
    /// Photos fetched ahead of the archive writer
    #[serde(default = "default_photo_prefetch")]
    pub photo_prefetch: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            schedule: default_schedule(),
            lock_name: default_lock_name(),
            lock_ttl: default_lock_ttl(),
            photo_prefetch: default_photo_prefetch(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

fn default_schedule() -> String {
    "0 */15 * * * *".to_string()
}

fn default_lock_name() -> String {
    "process-print-requests".to_string()
}

fn default_lock_ttl() -> HumanDuration {
    HumanDuration::from_secs(600)
}

fn default_photo_prefetch() -> usize {
    4
}

/// Document generation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertificateConfig {
    /// How far ahead a temporary certificate may be dated
    #[serde(default = "default_max_advance_days")]
    pub max_advance_days: u32,
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    #[serde(default = "default_temporary_certificate_template")]
    pub temporary_certificate_template: String,
    #[serde(default = "default_anonymous_elector_document_template")]
    pub anonymous_elector_document_template: String,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            max_advance_days: default_max_advance_days(),
            template_dir: default_template_dir(),
            temporary_certificate_template: default_temporary_certificate_template(),
            anonymous_elector_document_template: default_anonymous_elector_document_template(),
        }
    }
}

fn default_max_advance_days() -> u32 {
    10
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_temporary_certificate_template() -> String {
    "temporary-certificate.tpl".to_string()
}

fn default_anonymous_elector_document_template() -> String {
    "anonymous-elector-document.tpl".to_string()
}

/// Applicant photos
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhotoConfig {
    /// Public prefix for photo retrieval links
    #[serde(default = "default_photo_base_url")]
    pub base_url: String,
    /// Bucket used when a print request names none
    #[serde(default = "default_source_bucket")]
    pub source_bucket: String,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            base_url: default_photo_base_url(),
            source_bucket: default_source_bucket(),
        }
    }
}

fn default_photo_base_url() -> String {
    "http://localhost:8080/photos".to_string()
}

fn default_source_bucket() -> String {
    "elector-photos".to_string()
}

/// Provider-facing delivery location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_delivery_bucket")]
    pub bucket: String,
    #[serde(default = "default_delivery_prefix")]
    pub prefix: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: HumanDuration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            bucket: default_delivery_bucket(),
            prefix: default_delivery_prefix(),
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

fn default_delivery_bucket() -> String {
    "print-provider-outbound".to_string()
}

fn default_delivery_prefix() -> String {
    "outbound".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> HumanDuration {
    HumanDuration(std::time::Duration::from_millis(500))
}

/// Upper bounds for external calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_store_timeout")]
    pub store: HumanDuration,
    #[serde(default = "default_storage_timeout")]
    pub storage: HumanDuration,
    #[serde(default = "default_upload_timeout")]
    pub upload: HumanDuration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store: default_store_timeout(),
            storage: default_storage_timeout(),
            upload: default_upload_timeout(),
        }
    }
}

fn default_store_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_storage_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_upload_timeout() -> HumanDuration {
    HumanDuration::from_secs(120)
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Memory,
    #[default]
    Local,
    S3,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Root directory for the local provider; one subdirectory per bucket
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            root: default_storage_root(),
            endpoint: None,
            region: None,
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/storage")
}
