use bytes::Bytes;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::context::TickContext;
use super::error::{PipelineError, RequestFailure, with_timeout};
use super::manifest::write_psv;
use crate::models::{FileDetails, PhotoLocation};
use crate::storage::{ObjectStorage, StorageError};

/// Writes the manifest, generated PDFs and photos into one zip archive
///
/// Photos are fetched on a separate task, at most `prefetch` ahead of the
/// archive writer, so the next download overlaps writing the current entry.
#[derive(Clone)]
pub struct ZipPackager {
    storage: Arc<dyn ObjectStorage>,
    prefetch: usize,
    fetch_timeout: Duration,
}

type Fetched = (PhotoLocation, Result<Bytes, PipelineError>);

impl ZipPackager {
    pub fn new(storage: Arc<dyn ObjectStorage>, prefetch: usize, fetch_timeout: Duration) -> Self {
        Self {
            storage,
            prefetch: prefetch.max(1),
            fetch_timeout,
        }
    }

    pub async fn package(
        &self,
        ctx: &TickContext,
        details: &FileDetails,
    ) -> Result<Vec<u8>, PipelineError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        // Fixed timestamps keep archives for the same batch identical
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        let stored = deflated.compression_method(CompressionMethod::Stored);

        zip.start_file(details.manifest_name.as_str(), deflated)?;
        zip.write_all(&write_psv(&details.descriptors)?)?;

        for document in &details.documents {
            zip.start_file(document.name.as_str(), deflated)?;
            zip.write_all(&document.content)?;
        }

        let (tx, mut rx) = mpsc::channel::<Fetched>(self.prefetch);
        let fetcher = tokio::spawn(fetch_photos(
            self.storage.clone(),
            details.photos.clone(),
            self.fetch_timeout,
            tx,
        ));

        let mut missing = Vec::new();
        while let Some((location, fetched)) = rx.recv().await {
            match fetched {
                Ok(bytes) => {
                    zip.start_file(location.destination.as_str(), stored)?;
                    zip.write_all(&bytes)?;
                    debug!(entry = %location.destination, size = bytes.len(), "Photo added");
                }
                Err(PipelineError::Storage(e)) if e.is_permanent() => {
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        bucket = %location.source_bucket,
                        path = %location.source_path,
                        error = %e,
                        "Photo unavailable"
                    );
                    missing.push((location, e));
                }
                Err(e) => {
                    // Dropping the receiver stops the fetcher at its next send
                    drop(rx);
                    fetcher.abort();
                    return Err(e);
                }
            }
        }
        fetcher.await?;

        if !missing.is_empty() {
            return Err(PipelineError::PartialBatchFailure {
                batch_id: details.batch_id.clone(),
                failures: photo_failures(details, &missing),
            });
        }

        let archive = zip.finish()?.into_inner();
        info!(
            correlation_id = %ctx.correlation_id,
            archive = %details.archive_name,
            entries = details.entry_names().len(),
            size = archive.len(),
            "Archive packaged"
        );
        Ok(archive)
    }
}

async fn fetch_photos(
    storage: Arc<dyn ObjectStorage>,
    photos: Vec<PhotoLocation>,
    limit: Duration,
    tx: mpsc::Sender<Fetched>,
) {
    for location in photos {
        let fetched = with_timeout(
            "storage.fetch",
            limit,
            storage.fetch(&location.source_bucket, &location.source_path),
        )
        .await;

        if tx.send((location, fetched)).await.is_err() {
            return;
        }
    }
}

/// Every request whose photo could not be fetched
fn photo_failures(
    details: &FileDetails,
    missing: &[(PhotoLocation, StorageError)],
) -> Vec<RequestFailure> {
    details
        .descriptors
        .iter()
        .filter_map(|descriptor| {
            missing
                .iter()
                .find(|(location, _)| location.destination == descriptor.photo)
                .map(|(_, error)| RequestFailure {
                    request_id: descriptor.request_id.clone(),
                    reason: format!("photo unavailable: {error}"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Batch, SourceType};
    use crate::pipeline::manifest::read_psv;
    use crate::pipeline::testing::{batched, pipeline_fixture, store_photo};
    use std::collections::BTreeSet;
    use std::io::Read;

    async fn details_for(
        fixture: &crate::pipeline::testing::Fixture,
        requests: Vec<crate::models::PrintRequest>,
    ) -> FileDetails {
        let batch = Batch {
            id: "batch-1".to_string(),
            requests,
            max_size: 10,
        };
        fixture
            .builder
            .build_file_details(&TickContext::new("test"), &batch)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_archive_entries_match_manifest() {
        let fixture = pipeline_fixture();
        let requests = vec![
            batched("pr_1", SourceType::TemporaryCertificate, "batch-1"),
            batched("pr_2", SourceType::VoterCard, "batch-1"),
            batched("pr_3", SourceType::AnonymousElectorDocument, "batch-1"),
        ];
        for request in &requests {
            store_photo(&fixture.storage, request).await;
        }
        let details = details_for(&fixture, requests).await;

        let packager = ZipPackager::new(Arc::new(fixture.storage.clone()), 1, Duration::from_secs(5));
        let bytes = packager.package(&TickContext::new("test"), &details).await.unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let entries: BTreeSet<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(entries.len(), archive.len());

        let mut manifest = Vec::new();
        archive
            .by_name(&details.manifest_name)
            .unwrap()
            .read_to_end(&mut manifest)
            .unwrap();

        let mut referenced: BTreeSet<String> = BTreeSet::from([details.manifest_name.clone()]);
        for row in read_psv(&manifest).unwrap() {
            referenced.insert(row.photo);
            referenced.extend(row.document);
        }
        assert_eq!(entries, referenced);
    }

    #[tokio::test]
    async fn test_missing_photo_fails_only_its_requests() {
        let fixture = pipeline_fixture();
        let present = batched("pr_1", SourceType::VoterCard, "batch-1");
        let absent = batched("pr_2", SourceType::VoterCard, "batch-1");
        store_photo(&fixture.storage, &present).await;
        let details = details_for(&fixture, vec![present, absent]).await;

        let packager = ZipPackager::new(Arc::new(fixture.storage.clone()), 2, Duration::from_secs(5));
        let err = packager
            .package(&TickContext::new("test"), &details)
            .await
            .unwrap_err();

        let failed: Vec<_> = err.quarantined().iter().map(|f| f.request_id.as_str()).collect();
        assert_eq!(failed, vec!["pr_2"]);
    }

    #[tokio::test]
    async fn test_same_batch_packages_identically() {
        let fixture = pipeline_fixture();
        let request = batched("pr_1", SourceType::TemporaryCertificate, "batch-1");
        store_photo(&fixture.storage, &request).await;
        let details = details_for(&fixture, vec![request]).await;

        let packager = ZipPackager::new(Arc::new(fixture.storage.clone()), 4, Duration::from_secs(5));
        let ctx = TickContext::new("test");
        assert_eq!(
            packager.package(&ctx, &details).await.unwrap(),
            packager.package(&ctx, &details).await.unwrap()
        );
    }
}
