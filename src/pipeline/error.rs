use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::messaging::MessagingError;
use crate::storage::StorageError;

/// One print request that could not be turned into provider files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub request_id: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("batch {batch_id}: {} request(s) could not be generated", .failures.len())]
    PartialBatchFailure {
        batch_id: String,
        failures: Vec<RequestFailure>,
    },

    #[error("document generation failed for {request_id}: {reason}")]
    Generation { request_id: String, reason: String },

    #[error("manifest error: {0}")]
    Manifest(#[from] csv::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch {batch_id} changed status while being dispatched")]
    DispatchConflict { batch_id: String },

    #[error("messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("photo fetch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Worth retrying on a later tick without touching any request
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::Ledger(_)
                | PipelineError::Storage(_)
                | PipelineError::Timeout { .. }
                | PipelineError::Generation { .. }
                | PipelineError::Io(_)
                | PipelineError::Messaging(_)
                | PipelineError::Join(_)
        )
    }

    /// Requests to move to FAILED
    pub fn quarantined(&self) -> &[RequestFailure] {
        match self {
            PipelineError::PartialBatchFailure { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Bound an external call; an elapsed timer fails the batch like any other
/// transport error
pub async fn with_timeout<T, E, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<PipelineError>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(PipelineError::Timeout { operation, limit }),
    }
}
