use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::job::{BatchJob, TickOutcome};

/// Runs the batch job at every fire time of a cron schedule
///
/// A tick that has started always runs to completion; shutdown is only
/// observed while waiting for the next fire time.
pub struct Scheduler {
    job: Arc<BatchJob>,
    schedule: cron::Schedule,
}

impl Scheduler {
    pub fn new(job: Arc<BatchJob>, schedule: cron::Schedule) -> Self {
        Self { job, schedule }
    }

    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(schedule = %self.schedule, "Scheduler started");

        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                warn!(schedule = %self.schedule, "Schedule has no upcoming fire times");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            debug!(next = %next, "Waiting for next tick");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    match self.job.tick().await {
                        Ok(TickOutcome::LockHeld) => debug!("Tick skipped"),
                        Ok(TickOutcome::Completed { dispatched }) => {
                            debug!(batches = dispatched.len(), "Tick finished");
                        }
                        // Already reported by the job; the next tick retries
                        Err(e) => error!(error = %e, "Scheduled tick failed"),
                    }
                }
            }
        }
    }
}
