use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::context::TickContext;
use super::error::{PipelineError, RequestFailure};
use super::manifest::{archive_name, manifest_name};
use super::photos::PhotoLocator;
use crate::ero::{EroDirectory, EroError};
use crate::handlers::{HandlerError, HandlerRegistry};
use crate::models::{Batch, FileDetails, PrintRequest, PrintRequestDescriptor, RenderedDocument};

/// Builds the manifest rows, photo list and generated PDFs for a batch
#[derive(Clone)]
pub struct FileBundleBuilder {
    handlers: HandlerRegistry,
    ero: Arc<dyn EroDirectory>,
    locator: PhotoLocator,
}

enum Failure {
    Permanent(String),
    Transient(String),
}

impl From<HandlerError> for Failure {
    fn from(e: HandlerError) -> Self {
        if e.is_permanent() {
            Failure::Permanent(e.to_string())
        } else {
            Failure::Transient(e.to_string())
        }
    }
}

impl From<EroError> for Failure {
    fn from(e: EroError) -> Self {
        if e.is_permanent() {
            Failure::Permanent(e.to_string())
        } else {
            Failure::Transient(e.to_string())
        }
    }
}

impl FileBundleBuilder {
    pub fn new(
        handlers: HandlerRegistry,
        ero: Arc<dyn EroDirectory>,
        locator: PhotoLocator,
    ) -> Self {
        Self {
            handlers,
            ero,
            locator,
        }
    }

    /// All or nothing: any request that cannot be generated fails the batch
    ///
    /// Requests at fault are collected into
    /// [`PipelineError::PartialBatchFailure`]; a failure that is not the
    /// request's fault aborts straight away with
    /// [`PipelineError::Generation`].
    pub async fn build_file_details(
        &self,
        ctx: &TickContext,
        batch: &Batch,
    ) -> Result<FileDetails, PipelineError> {
        let mut descriptors = Vec::with_capacity(batch.len());
        let mut documents = Vec::new();
        let mut photos = BTreeSet::new();
        let mut failures = Vec::new();

        for request in &batch.requests {
            let location = self.locator.locate_reference(&request.photo);

            match self.describe(request, &location.destination).await {
                Ok((descriptor, document)) => {
                    descriptors.push(descriptor);
                    documents.extend(document);
                    photos.insert(location);
                }
                Err(Failure::Permanent(reason)) => {
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        id = %request.id,
                        %reason,
                        "Print request cannot be generated"
                    );
                    failures.push(RequestFailure {
                        request_id: request.id.clone(),
                        reason,
                    });
                }
                Err(Failure::Transient(reason)) => {
                    return Err(PipelineError::Generation {
                        request_id: request.id.clone(),
                        reason,
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(PipelineError::PartialBatchFailure {
                batch_id: batch.id.clone(),
                failures,
            });
        }

        let details = FileDetails {
            batch_id: batch.id.clone(),
            manifest_name: manifest_name(&batch.id),
            archive_name: archive_name(&batch.id),
            descriptors,
            photos: photos.into_iter().collect(),
            documents,
        };

        info!(
            correlation_id = %ctx.correlation_id,
            batch_id = %batch.id,
            requests = details.descriptors.len(),
            documents = details.documents.len(),
            photos = details.photos.len(),
            "File details built"
        );
        Ok(details)
    }

    async fn describe(
        &self,
        request: &PrintRequest,
        photo: &str,
    ) -> Result<(PrintRequestDescriptor, Option<RenderedDocument>), Failure> {
        let handler = self.handlers.get(request.source_type)?;
        let office = self.ero.office_for(&request.gss_code).await?;
        let document = handler.generate(request, &office).await?;

        let descriptor = PrintRequestDescriptor {
            request_id: request.id.clone(),
            source_type: request.source_type,
            source_reference: request.source_reference.clone(),
            certificate_number: request.certificate_number.clone(),
            gss_code: office.gss_code,
            office_name: office.name,
            elector_name: request.elector_name().unwrap_or_default().to_string(),
            photo: photo.to_string(),
            document: document.as_ref().map(|d| d.name.clone()),
        };
        Ok((descriptor, document))
    }
}
