//! Batch print-request pipeline
//!
//! One scheduled tick walks
//! `Idle -> Locking -> Selecting -> Building -> Packaging -> Submitting -> Idle`:
//!
//! - [`BatchSelector`] claims PENDING requests oldest first
//! - [`FileBundleBuilder`] resolves photos, renders PDFs and builds manifest rows
//! - [`ZipPackager`] streams manifest, PDFs and fetched photos into one archive
//! - [`DeliverySubmitter`] uploads the archive and moves the batch to DISPATCHED
//! - [`BatchJob`] holds the job lock around all of it; [`Scheduler`] fires it
//!   on a cron schedule
//!
//! Batches left at BATCHED by a failed tick are redelivered under their
//! original batch id before any new batch is selected, so the provider sees
//! the same archive name again.

mod bundle;
mod context;
mod error;
mod job;
mod manifest;
mod packager;
mod photos;
mod scheduler;
mod selector;
mod submitter;

#[cfg(test)]
pub(crate) mod testing;

pub use bundle::FileBundleBuilder;
pub use context::TickContext;
pub use error::{PipelineError, RequestFailure, with_timeout};
pub use job::{BatchJob, TickOutcome, TickState};
pub use manifest::{ManifestRow, archive_name, manifest_name, read_psv, write_psv};
pub use packager::ZipPackager;
pub use photos::{PhotoLinks, PhotoLocator};
pub use scheduler::Scheduler;
pub use selector::BatchSelector;
pub use submitter::{DeliverySubmitter, DeliveryTarget, DispatchResult};
