use bytes::Bytes;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::context::TickContext;
use super::error::{PipelineError, with_timeout};
use crate::ledger::PrintRequestStore;
use crate::messaging::{
    MessageProducer, PRINT_BATCH_DISPATCHED_STREAM, PrintBatchDispatched,
    STATISTICS_UPDATE_STREAM, StatisticsUpdate, publish_json,
};
use crate::models::{Batch, FileDetails, PrintRequestStatus};
use crate::storage::ObjectStorage;

/// Where and how long to wait for delivery calls
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    pub bucket: String,
    pub prefix: String,
    pub store_timeout: Duration,
    pub storage_timeout: Duration,
    pub upload_timeout: Duration,
}

impl DeliveryTarget {
    pub fn key_for(&self, archive_name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            archive_name.to_string()
        } else {
            format!("{prefix}/{archive_name}")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub batch_id: String,
    pub archive_key: String,
    pub request_count: usize,
    /// False when an earlier attempt had already delivered the archive
    pub uploaded: bool,
}

/// Uploads a packaged batch, then marks its requests DISPATCHED
///
/// The status change only happens after the upload is acknowledged and moves
/// the whole batch in one compare-and-set, so a failed upload leaves every
/// request at BATCHED for redelivery.
#[derive(Clone)]
pub struct DeliverySubmitter {
    store: Arc<dyn PrintRequestStore>,
    storage: Arc<dyn ObjectStorage>,
    producer: Arc<dyn MessageProducer>,
    target: DeliveryTarget,
    /// Statistics updates still in flight
    updates: Arc<Mutex<JoinSet<()>>>,
}

/// What the ledger transition and the notifications need about a batch
struct Dispatch<'a> {
    batch_id: &'a str,
    key: String,
    ids: Vec<String>,
    references: BTreeSet<&'a str>,
    uploaded: bool,
}

impl DeliverySubmitter {
    pub fn new(
        store: Arc<dyn PrintRequestStore>,
        storage: Arc<dyn ObjectStorage>,
        producer: Arc<dyn MessageProducer>,
        target: DeliveryTarget,
    ) -> Self {
        Self {
            store,
            storage,
            producer,
            target,
            updates: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Whether the archive for `archive_name` is already at the delivery location
    pub async fn is_delivered(&self, archive_name: &str) -> Result<bool, PipelineError> {
        let key = self.target.key_for(archive_name);
        with_timeout(
            "storage.exists",
            self.target.storage_timeout,
            self.storage.exists(&self.target.bucket, &key),
        )
        .await
    }

    /// Finish a batch whose archive an earlier attempt already delivered.
    /// The delivered archive is authoritative, so its requests are moved to
    /// DISPATCHED as they stand, without generating anything again.
    pub async fn confirm_delivered(
        &self,
        ctx: &TickContext,
        batch: &Batch,
        archive_name: &str,
    ) -> Result<DispatchResult, PipelineError> {
        info!(
            correlation_id = %ctx.correlation_id,
            batch_id = %batch.id,
            archive = archive_name,
            "Archive already delivered, confirming dispatch"
        );
        self.dispatch(
            ctx,
            Dispatch {
                batch_id: &batch.id,
                key: self.target.key_for(archive_name),
                ids: batch.request_ids(),
                references: batch
                    .requests
                    .iter()
                    .map(|r| r.source_reference.as_str())
                    .collect(),
                uploaded: false,
            },
        )
        .await
    }

    /// Wait for in-flight statistics updates, each already bounded by the
    /// storage timeout; anything still running after that is abandoned
    pub async fn drain(&self) {
        let mut updates = std::mem::take(&mut *self.updates.lock().await);
        if updates.is_empty() {
            return;
        }

        let pending = updates.len();
        let drained = tokio::time::timeout(self.target.storage_timeout, async {
            while updates.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => debug!(pending, "Statistics updates drained"),
            Err(_) => warn!(
                remaining = updates.len(),
                "Statistics updates abandoned at shutdown"
            ),
        }
    }

    pub async fn submit(
        &self,
        ctx: &TickContext,
        details: &FileDetails,
        archive: Vec<u8>,
    ) -> Result<DispatchResult, PipelineError> {
        let key = self.target.key_for(&details.archive_name);
        let bucket = self.target.bucket.as_str();

        let delivered = with_timeout(
            "storage.exists",
            self.target.storage_timeout,
            self.storage.exists(bucket, &key),
        )
        .await?;

        if delivered {
            info!(
                correlation_id = %ctx.correlation_id,
                bucket, key = %key,
                "Archive already delivered, skipping upload"
            );
        } else {
            with_timeout(
                "storage.put",
                self.target.upload_timeout,
                self.storage.put(bucket, &key, Bytes::from(archive)),
            )
            .await?;
        }

        self.dispatch(
            ctx,
            Dispatch {
                batch_id: &details.batch_id,
                key,
                ids: details.request_ids(),
                references: details
                    .descriptors
                    .iter()
                    .map(|d| d.source_reference.as_str())
                    .collect(),
                uploaded: !delivered,
            },
        )
        .await
    }

    async fn dispatch(
        &self,
        ctx: &TickContext,
        dispatch: Dispatch<'_>,
    ) -> Result<DispatchResult, PipelineError> {
        let dispatched = with_timeout(
            "store.compare_and_set_all",
            self.target.store_timeout,
            self.store.compare_and_set_all(
                &dispatch.ids,
                PrintRequestStatus::Batched,
                PrintRequestStatus::Dispatched,
            ),
        )
        .await?;

        if !dispatched {
            error!(
                correlation_id = %ctx.correlation_id,
                batch_id = %dispatch.batch_id,
                key = %dispatch.key,
                "Archive delivered but batch no longer BATCHED; nothing dispatched"
            );
            return Err(PipelineError::DispatchConflict {
                batch_id: dispatch.batch_id.to_string(),
            });
        }

        info!(
            correlation_id = %ctx.correlation_id,
            batch_id = %dispatch.batch_id,
            requests = dispatch.ids.len(),
            key = %dispatch.key,
            "Batch dispatched"
        );

        let result = DispatchResult {
            batch_id: dispatch.batch_id.to_string(),
            archive_key: dispatch.key.clone(),
            request_count: dispatch.ids.len(),
            uploaded: dispatch.uploaded,
        };
        self.notify(ctx, dispatch).await;
        Ok(result)
    }

    async fn notify(&self, ctx: &TickContext, dispatch: Dispatch<'_>) {
        let message = PrintBatchDispatched {
            batch_id: dispatch.batch_id.to_string(),
            archive: dispatch.key,
            request_ids: dispatch.ids,
            correlation_id: ctx.correlation_id.clone(),
            dispatched_at: Utc::now(),
        };

        let published = with_timeout(
            "messaging.publish",
            self.target.storage_timeout,
            publish_json(self.producer.as_ref(), PRINT_BATCH_DISPATCHED_STREAM, &message),
        )
        .await;
        if let Err(e) = published {
            warn!(correlation_id = %ctx.correlation_id, error = %e, "Dispatch notification not sent");
        }

        let mut updates = self.updates.lock().await;
        while updates.try_join_next().is_some() {}

        for source_reference in dispatch.references {
            let producer = self.producer.clone();
            let limit = self.target.storage_timeout;
            let update = StatisticsUpdate {
                source_reference: source_reference.to_string(),
                correlation_id: ctx.correlation_id.clone(),
            };

            updates.spawn(async move {
                let sent = with_timeout(
                    "messaging.statistics",
                    limit,
                    publish_json(producer.as_ref(), STATISTICS_UPDATE_STREAM, &update),
                )
                .await;
                if let Err(e) = sent {
                    warn!(
                        source_reference = %update.source_reference,
                        error = %e,
                        "Statistics update not sent"
                    );
                }
            });
        }
    }
}
