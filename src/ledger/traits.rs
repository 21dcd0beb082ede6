use async_trait::async_trait;
use std::time::Duration;

use super::error::Result;
use crate::models::{PrintRequest, PrintRequestStatus};

/// Persistent print request store consumed by the batch pipeline
///
/// Every status change is a compare-and-set against the stored status, so
/// concurrent selectors and submitters can never both win the same request.
#[async_trait]
pub trait PrintRequestStore: Send + Sync {
    /// Requests with `status`, oldest `created_at` first
    async fn find_by_status(
        &self,
        status: PrintRequestStatus,
        limit: usize,
    ) -> Result<Vec<PrintRequest>>;

    async fn find_pending(&self, limit: usize) -> Result<Vec<PrintRequest>> {
        self.find_by_status(PrintRequestStatus::Pending, limit).await
    }

    async fn get(&self, id: &str) -> Result<Option<PrintRequest>>;

    /// Move `id` to `new` only if it is currently `expected`
    async fn compare_and_set_status(
        &self,
        id: &str,
        expected: PrintRequestStatus,
        new: PrintRequestStatus,
    ) -> Result<bool>;

    /// `PENDING -> BATCHED`, stamping the batch id
    async fn claim_for_batch(&self, id: &str, batch_id: &str) -> Result<bool>;

    /// Move every id or none of them
    async fn compare_and_set_all(
        &self,
        ids: &[String],
        expected: PrintRequestStatus,
        new: PrintRequestStatus,
    ) -> Result<bool>;

    /// `expected -> FAILED`, recording why
    async fn mark_failed(
        &self,
        id: &str,
        expected: PrintRequestStatus,
        reason: &str,
    ) -> Result<bool>;
}

/// Named, expiring mutual-exclusion lease shared by every instance
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Take the lease if it is free, expired, or already ours
    async fn try_acquire(&self, name: &str, owner: &str, ttl: Duration) -> Result<bool>;

    /// Give the lease back; false when someone else holds it
    async fn release(&self, name: &str, owner: &str) -> Result<bool>;
}
