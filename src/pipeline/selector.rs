use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::TickContext;
use super::error::{PipelineError, with_timeout};
use crate::ledger::PrintRequestStore;
use crate::models::{Batch, PrintRequestStatus};

/// Claims pending print requests into batches
///
/// Candidates are read oldest first and each one is claimed with a
/// `PENDING -> BATCHED` compare-and-set. A candidate taken by a concurrent
/// selector is skipped and the store is asked again, so a batch only comes
/// back short when no pending requests remain.
#[derive(Clone)]
pub struct BatchSelector {
    store: Arc<dyn PrintRequestStore>,
    timeout: Duration,
}

impl BatchSelector {
    pub fn new(store: Arc<dyn PrintRequestStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn select_batch(
        &self,
        ctx: &TickContext,
        max_size: usize,
    ) -> Result<Batch, PipelineError> {
        let mut batch = Batch::empty(Uuid::now_v7().to_string(), max_size);

        while batch.len() < max_size {
            let remaining = max_size - batch.len();
            let candidates = with_timeout(
                "store.find_pending",
                self.timeout,
                self.store.find_pending(remaining),
            )
            .await?;

            if candidates.is_empty() {
                break;
            }

            for mut request in candidates {
                let claimed = with_timeout(
                    "store.claim_for_batch",
                    self.timeout,
                    self.store.claim_for_batch(&request.id, &batch.id),
                )
                .await?;

                if claimed {
                    request.status = PrintRequestStatus::Batched;
                    request.batch_id = Some(batch.id.clone());
                    batch.requests.push(request);
                } else {
                    debug!(id = %request.id, "Lost claim to another selector");
                }
            }
        }

        info!(
            correlation_id = %ctx.correlation_id,
            batch_id = %batch.id,
            size = batch.len(),
            max_size,
            "Batch selected"
        );
        Ok(batch)
    }

    /// Batches left at BATCHED by an earlier failed tick, regrouped under
    /// their original batch id
    pub async fn find_stranded(
        &self,
        ctx: &TickContext,
        max_size: usize,
    ) -> Result<Vec<Batch>, PipelineError> {
        let stranded = with_timeout(
            "store.find_batched",
            self.timeout,
            self.store
                .find_by_status(PrintRequestStatus::Batched, usize::MAX),
        )
        .await?;

        let mut groups: BTreeMap<String, Batch> = BTreeMap::new();
        for request in stranded {
            let batch_id = match &request.batch_id {
                Some(id) => id.clone(),
                None => {
                    warn!(id = %request.id, "Batched request has no batch id");
                    continue;
                }
            };
            groups
                .entry(batch_id.clone())
                .or_insert_with(|| Batch::empty(batch_id, max_size))
                .requests
                .push(request);
        }

        if !groups.is_empty() {
            info!(
                correlation_id = %ctx.correlation_id,
                batches = groups.len(),
                "Found batches awaiting redelivery"
            );
        }
        Ok(groups.into_values().collect())
    }
}
