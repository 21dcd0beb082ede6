use bon::Builder;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use super::bundle::FileBundleBuilder;
use super::context::TickContext;
use super::error::{PipelineError, with_timeout};
use super::manifest::archive_name;
use super::packager::ZipPackager;
use super::photos::PhotoLocator;
use super::selector::BatchSelector;
use super::submitter::{DeliverySubmitter, DeliveryTarget, DispatchResult};
use crate::config::Config;
use crate::ero::StaticEroDirectory;
use crate::handlers::HandlerRegistry;
use crate::ledger::{LeaseStore, PrintRequestStore};
use crate::messaging::MessageProducer;
use crate::models::{Batch, PrintRequestStatus};
use crate::observability::Metrics;
use crate::render::TemplateRenderer;
use crate::storage::ObjectStorage;
use crate::validation::{Clock, DateValidator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    Idle,
    Locking,
    Selecting,
    Building,
    Packaging,
    Submitting,
}

impl fmt::Display for TickState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TickState::Idle => "idle",
            TickState::Locking => "locking",
            TickState::Selecting => "selecting",
            TickState::Building => "building",
            TickState::Packaging => "packaging",
            TickState::Submitting => "submitting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another instance holds the job lock
    LockHeld,
    /// Redelivered and newly selected batches, in dispatch order; empty when
    /// there was nothing to do
    Completed { dispatched: Vec<DispatchResult> },
}

impl TickOutcome {
    pub fn dispatched(&self) -> &[DispatchResult] {
        match self {
            TickOutcome::LockHeld => &[],
            TickOutcome::Completed { dispatched } => dispatched,
        }
    }
}

/// Scheduled batch job: one call to [`BatchJob::tick`] per fire time
#[derive(Builder)]
pub struct BatchJob {
    /// Lock name, also the job name in logs
    #[builder(into)]
    job_name: String,
    #[builder(into, default = Uuid::new_v4().to_string())]
    instance_id: String,
    store: Arc<dyn PrintRequestStore>,
    lease: Arc<dyn LeaseStore>,
    selector: BatchSelector,
    bundles: FileBundleBuilder,
    packager: ZipPackager,
    submitter: DeliverySubmitter,
    #[builder(default)]
    metrics: Arc<Metrics>,
    batch_size: usize,
    lock_ttl: Duration,
    store_timeout: Duration,
}

impl BatchJob {
    /// Wire every stage from configuration
    pub fn from_config<S>(
        config: &Config,
        store: Arc<S>,
        storage: Arc<dyn ObjectStorage>,
        producer: Arc<dyn MessageProducer>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self
    where
        S: PrintRequestStore + LeaseStore + 'static,
    {
        let store_timeout = config.timeouts.store.as_duration();
        let renderer = TemplateRenderer::new(&config.certificate.template_dir);
        let validator = DateValidator::new(clock, config.certificate.max_advance_days);
        let handlers = HandlerRegistry::with_defaults(renderer, validator, &config.certificate);
        let target = DeliveryTarget {
            bucket: config.delivery.bucket.clone(),
            prefix: config.delivery.prefix.clone(),
            store_timeout,
            storage_timeout: config.timeouts.storage.as_duration(),
            upload_timeout: config.timeouts.upload.as_duration(),
        };

        BatchJob::builder()
            .job_name(&config.batch.lock_name)
            .store(store.clone())
            .lease(store.clone())
            .selector(BatchSelector::new(store.clone(), store_timeout))
            .bundles(FileBundleBuilder::new(
                handlers,
                Arc::new(StaticEroDirectory::new(&config.offices)),
                PhotoLocator::new(&config.photos.source_bucket),
            ))
            .packager(ZipPackager::new(
                storage.clone(),
                config.batch.photo_prefetch,
                config.timeouts.storage.as_duration(),
            ))
            .submitter(DeliverySubmitter::new(store, storage, producer, target))
            .metrics(metrics)
            .batch_size(config.batch.size)
            .lock_ttl(config.batch.lock_ttl.as_duration())
            .store_timeout(store_timeout)
            .build()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Let in-flight statistics updates finish before the process exits
    pub async fn drain(&self) {
        self.submitter.drain().await;
    }

    /// Run one tick under a fresh correlation id
    pub async fn tick(&self) -> Result<TickOutcome, PipelineError> {
        let ctx = TickContext::new(&self.job_name);
        let span = ctx.span();
        self.run(&ctx).instrument(span).await
    }

    pub async fn run(&self, ctx: &TickContext) -> Result<TickOutcome, PipelineError> {
        self.metrics.tick_started();
        self.enter(ctx, TickState::Locking);

        let acquired = with_timeout(
            "lease.try_acquire",
            self.store_timeout,
            self.lease
                .try_acquire(&self.job_name, &self.instance_id, self.lock_ttl),
        )
        .await;

        match acquired {
            Ok(true) => {}
            Ok(false) => {
                self.metrics.tick_skipped();
                info!(correlation_id = %ctx.correlation_id, "Job lock held elsewhere, skipping tick");
                self.enter(ctx, TickState::Idle);
                return Ok(TickOutcome::LockHeld);
            }
            Err(e) => {
                self.metrics.tick_failed();
                error!(correlation_id = %ctx.correlation_id, error = %e, "Could not take job lock");
                self.enter(ctx, TickState::Idle);
                return Err(e);
            }
        }

        let guard = LeaseGuard {
            lease: self.lease.clone(),
            name: self.job_name.clone(),
            owner: self.instance_id.clone(),
            timeout: self.store_timeout,
            released: false,
        };
        let result = self.process(ctx).await;
        guard.release().await;

        match &result {
            Ok(outcome) => info!(
                correlation_id = %ctx.correlation_id,
                batches = outcome.dispatched().len(),
                "Tick complete"
            ),
            Err(e) => {
                self.metrics.tick_failed();
                error!(
                    correlation_id = %ctx.correlation_id,
                    error = %e,
                    transient = e.is_transient(),
                    "Tick failed"
                );
            }
        }

        self.enter(ctx, TickState::Idle);
        result
    }

    async fn process(&self, ctx: &TickContext) -> Result<TickOutcome, PipelineError> {
        self.enter(ctx, TickState::Selecting);
        let mut dispatched = Vec::new();

        for batch in self.selector.find_stranded(ctx, self.batch_size).await? {
            info!(
                correlation_id = %ctx.correlation_id,
                batch_id = %batch.id,
                size = batch.len(),
                "Redelivering batch"
            );
            dispatched.push(self.redeliver(ctx, &batch).await?);
        }

        self.enter(ctx, TickState::Selecting);
        let batch = self.selector.select_batch(ctx, self.batch_size).await?;
        if batch.is_empty() {
            info!(correlation_id = %ctx.correlation_id, "No pending print requests");
        } else {
            dispatched.push(self.deliver(ctx, &batch).await?);
        }

        Ok(TickOutcome::Completed { dispatched })
    }

    /// A stranded batch whose archive already reached the provider only needs
    /// its ledger transition; anything else goes through the full pipeline
    async fn redeliver(&self, ctx: &TickContext, batch: &Batch) -> Result<DispatchResult, PipelineError> {
        let archive = archive_name(&batch.id);
        if !self.submitter.is_delivered(&archive).await? {
            return self.deliver(ctx, batch).await;
        }

        self.enter(ctx, TickState::Submitting);
        let result = self.submitter.confirm_delivered(ctx, batch, &archive).await?;
        self.metrics.batch_dispatched(result.request_count);
        Ok(result)
    }

    async fn deliver(&self, ctx: &TickContext, batch: &Batch) -> Result<DispatchResult, PipelineError> {
        self.enter(ctx, TickState::Building);
        let details = match self.bundles.build_file_details(ctx, batch).await {
            Ok(details) => details,
            Err(e) => return Err(self.quarantine(ctx, e).await),
        };

        self.enter(ctx, TickState::Packaging);
        let archive = match self.packager.package(ctx, &details).await {
            Ok(archive) => archive,
            Err(e) => return Err(self.quarantine(ctx, e).await),
        };

        self.enter(ctx, TickState::Submitting);
        let result = self.submitter.submit(ctx, &details, archive).await?;
        self.metrics.batch_dispatched(result.request_count);
        Ok(result)
    }

    /// Move requests at fault to FAILED; the rest of the batch stays BATCHED
    /// and goes out with the next tick
    async fn quarantine(&self, ctx: &TickContext, err: PipelineError) -> PipelineError {
        for failure in err.quarantined() {
            let marked = with_timeout(
                "store.mark_failed",
                self.store_timeout,
                self.store.mark_failed(
                    &failure.request_id,
                    PrintRequestStatus::Batched,
                    &failure.reason,
                ),
            )
            .await;

            match marked {
                Ok(true) => {
                    self.metrics.request_quarantined();
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        id = %failure.request_id,
                        reason = %failure.reason,
                        "Print request quarantined"
                    );
                }
                Ok(false) => debug!(id = %failure.request_id, "Request already moved on"),
                Err(e) => error!(
                    correlation_id = %ctx.correlation_id,
                    id = %failure.request_id,
                    error = %e,
                    "Could not quarantine print request"
                ),
            }
        }
        err
    }

    fn enter(&self, ctx: &TickContext, state: TickState) {
        info!(correlation_id = %ctx.correlation_id, job = %self.job_name, %state, "Tick state");
    }
}

/// Held job lock; released explicitly, or in the background if the tick is
/// dropped mid-flight
struct LeaseGuard {
    lease: Arc<dyn LeaseStore>,
    name: String,
    owner: String,
    timeout: Duration,
    released: bool,
}

impl LeaseGuard {
    async fn release(mut self) {
        self.released = true;
        let released = with_timeout(
            "lease.release",
            self.timeout,
            self.lease.release(&self.name, &self.owner),
        )
        .await;

        match released {
            Ok(true) => debug!(name = %self.name, "Job lock released"),
            Ok(false) => warn!(name = %self.name, "Job lock was no longer ours at release"),
            Err(e) => error!(
                name = %self.name,
                owner = %self.owner,
                error = %e,
                "Best-effort job lock release failed; lock stays until its TTL"
            ),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        error!(name = %self.name, "Tick aborted while holding job lock");
        let lease = self.lease.clone();
        let name = std::mem::take(&mut self.name);
        let owner = std::mem::take(&mut self.owner);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = lease.release(&name, &owner).await {
                    error!(name = %name, error = %e, "Best-effort job lock release failed");
                }
            });
        }
    }
}
