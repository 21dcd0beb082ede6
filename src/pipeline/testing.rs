//! Shared fixtures for pipeline unit tests

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use super::bundle::FileBundleBuilder;
use super::job::BatchJob;
use super::photos::PhotoLocator;
use crate::config::Config;
use crate::ero::StaticEroDirectory;
use crate::handlers::HandlerRegistry;
use crate::ledger::{self, FjallStore, LeaseStore, LedgerError, PrintRequestStore};
use crate::messaging::InMemoryProducer;
use crate::models::{PhotoReference, PrintRequest, PrintRequestStatus, SourceType};
use crate::observability::Metrics;
use crate::render::TemplateRenderer;
use crate::storage::{self, ObjectStorage, StorageClient, StorageError, UploadMetadata};
use crate::validation::{DateValidator, FixedClock};

pub const PHOTO_BUCKET: &str = "elector-photos";

const TEMPORARY_CERTIFICATE: &str = "# Temporary Certificate\n\
    {{elector_name}}\n\
    Certificate {{certificate_number}}\n\
    {{office_name}} ({{gss_code}})\n\
    Valid on {{valid_on_date}}, issued {{issue_date}}";

const ANONYMOUS_ELECTOR_DOCUMENT: &str = "# Anonymous Elector's Document\n\
    Certificate {{certificate_number}}\n\
    {{office_name}} ({{gss_code}})";

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 2, 4).unwrap()
}

pub fn create_test_store() -> (FjallStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = FjallStore::open(temp_dir.path().join("ledger")).unwrap();
    (store, temp_dir)
}

pub fn pending_of(id: &str, source_type: SourceType, created_offset: i64) -> PrintRequest {
    let created_at = Utc.timestamp_millis_opt(1_675_000_000_000 + created_offset).unwrap();
    PrintRequest {
        id: id.to_string(),
        source_type,
        source_reference: format!("app-{id}"),
        gss_code: "E09000007".to_string(),
        certificate_number: format!("CERT-{id}"),
        status: PrintRequestStatus::Pending,
        photo: PhotoReference {
            bucket: None,
            path: format!("E09000007/{id}/photo.png"),
        },
        placeholders: [("elector_name".to_string(), format!("Elector {id}"))]
            .into_iter()
            .collect(),
        created_at,
        valid_on_date: (source_type == SourceType::TemporaryCertificate)
            .then(|| today() + chrono::Duration::days(2)),
        batch_id: None,
        failure_reason: None,
        status_updated_at: created_at,
    }
}

pub fn pending_request(id: &str, created_offset: i64) -> PrintRequest {
    pending_of(id, SourceType::VoterCard, created_offset)
}

pub fn batched(id: &str, source_type: SourceType, batch_id: &str) -> PrintRequest {
    PrintRequest {
        status: PrintRequestStatus::Batched,
        batch_id: Some(batch_id.to_string()),
        ..pending_of(id, source_type, 0)
    }
}

pub async fn store_photo(storage: &StorageClient, request: &PrintRequest) {
    storage
        .put(
            PHOTO_BUCKET,
            &request.photo.path,
            Bytes::from(format!("png-{}", request.id)),
        )
        .await
        .unwrap();
}

pub struct Fixture {
    pub config: Config,
    pub builder: FileBundleBuilder,
    pub storage: StorageClient,
    pub producer: Arc<InMemoryProducer>,
    _templates: TempDir,
}

impl Fixture {
    pub fn job(&self, store: &FjallStore, batch_size: usize) -> BatchJob {
        self.job_at(Arc::new(store.clone()), batch_size, today())
    }

    /// Job whose clock reads `date`
    pub fn job_at<S>(&self, store: Arc<S>, batch_size: usize, date: NaiveDate) -> BatchJob
    where
        S: PrintRequestStore + LeaseStore + 'static,
    {
        let mut config = self.config.clone();
        config.batch.size = batch_size;
        BatchJob::from_config(
            &config,
            store,
            Arc::new(self.storage.clone()),
            self.producer.clone(),
            Arc::new(FixedClock::on(date)),
            Arc::new(Metrics::new()),
        )
    }
}

pub fn pipeline_fixture() -> Fixture {
    let templates = TempDir::new().unwrap();
    std::fs::write(templates.path().join("tc.tpl"), TEMPORARY_CERTIFICATE).unwrap();
    std::fs::write(templates.path().join("aed.tpl"), ANONYMOUS_ELECTOR_DOCUMENT).unwrap();

    let mut config = Config::default();
    config.batch.lock_name = "print-test".to_string();
    config.certificate.template_dir = templates.path().to_path_buf();
    config.certificate.temporary_certificate_template = "tc.tpl".to_string();
    config.certificate.anonymous_elector_document_template = "aed.tpl".to_string();
    config.photos.source_bucket = PHOTO_BUCKET.to_string();
    config
        .offices
        .insert("E09000007".to_string(), "Camden".to_string());

    let validator = DateValidator::new(
        Arc::new(FixedClock::on(today())),
        config.certificate.max_advance_days,
    );
    let builder = FileBundleBuilder::new(
        HandlerRegistry::with_defaults(
            TemplateRenderer::new(templates.path()),
            validator,
            &config.certificate,
        ),
        Arc::new(StaticEroDirectory::new(&config.offices)),
        PhotoLocator::new(PHOTO_BUCKET),
    );

    Fixture {
        config,
        builder,
        storage: StorageClient::in_memory(),
        producer: Arc::new(InMemoryProducer::new()),
        _templates: templates,
    }
}

/// Storage whose uploads always fail
pub struct FailingUpload {
    inner: StorageClient,
}

impl FailingUpload {
    pub fn new(inner: StorageClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ObjectStorage for FailingUpload {
    async fn fetch(&self, bucket: &str, path: &str) -> storage::Result<Bytes> {
        self.inner.fetch(bucket, path).await
    }

    async fn put(&self, _bucket: &str, path: &str, _data: Bytes) -> storage::Result<UploadMetadata> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        Err(StorageError::UploadFailed(format!("{path}: connection reset")))
    }

    async fn exists(&self, bucket: &str, path: &str) -> storage::Result<bool> {
        self.inner.exists(bucket, path).await
    }
}

/// Ledger whose batch-wide dispatch transition always times out
pub struct StuckDispatch {
    inner: FjallStore,
}

impl StuckDispatch {
    pub fn new(inner: FjallStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl PrintRequestStore for StuckDispatch {
    async fn find_by_status(
        &self,
        status: PrintRequestStatus,
        limit: usize,
    ) -> ledger::Result<Vec<PrintRequest>> {
        self.inner.find_by_status(status, limit).await
    }

    async fn get(&self, id: &str) -> ledger::Result<Option<PrintRequest>> {
        self.inner.get(id).await
    }

    async fn compare_and_set_status(
        &self,
        id: &str,
        expected: PrintRequestStatus,
        new: PrintRequestStatus,
    ) -> ledger::Result<bool> {
        self.inner.compare_and_set_status(id, expected, new).await
    }

    async fn claim_for_batch(&self, id: &str, batch_id: &str) -> ledger::Result<bool> {
        self.inner.claim_for_batch(id, batch_id).await
    }

    async fn compare_and_set_all(
        &self,
        _ids: &[String],
        _expected: PrintRequestStatus,
        _new: PrintRequestStatus,
    ) -> ledger::Result<bool> {
        Err(LedgerError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "write transaction timed out",
        )))
    }

    async fn mark_failed(
        &self,
        id: &str,
        expected: PrintRequestStatus,
        reason: &str,
    ) -> ledger::Result<bool> {
        self.inner.mark_failed(id, expected, reason).await
    }
}

#[async_trait]
impl LeaseStore for StuckDispatch {
    async fn try_acquire(&self, name: &str, owner: &str, ttl: Duration) -> ledger::Result<bool> {
        self.inner.try_acquire(name, owner, ttl).await
    }

    async fn release(&self, name: &str, owner: &str) -> ledger::Result<bool> {
        self.inner.release(name, owner).await
    }
}
