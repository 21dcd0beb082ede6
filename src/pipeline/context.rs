use chrono::{DateTime, Utc};
use tracing::{Span, info_span};
use uuid::Uuid;

/// Per-tick context passed explicitly through every pipeline call
#[derive(Debug, Clone)]
pub struct TickContext {
    pub correlation_id: String,
    pub job: String,
    pub started_at: DateTime<Utc>,
}

impl TickContext {
    /// Fresh correlation id for a scheduled tick
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            job: job.into(),
            started_at: Utc::now(),
        }
    }

    pub fn span(&self) -> Span {
        info_span!(
            "print_batch_tick",
            correlation_id = %self.correlation_id,
            job = %self.job
        )
    }
}
