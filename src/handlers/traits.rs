use async_trait::async_trait;
use thiserror::Error;

use crate::ero::Office;
use crate::models::{PrintRequest, RenderedDocument, SourceType};
use crate::render::RenderError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("no handler registered for source type {0}")]
    UnsupportedSourceType(SourceType),

    #[error("print request {0} has no validOnDate")]
    MissingValidOnDate(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl HandlerError {
    /// The request itself is at fault; generating it again cannot succeed
    ///
    /// Unreadable or malformed templates are deployment problems and affect
    /// every request of a type, so they are not pinned on one request.
    pub fn is_permanent(&self) -> bool {
        match self {
            HandlerError::UnsupportedSourceType(_)
            | HandlerError::MissingValidOnDate(_)
            | HandlerError::Validation(_) => true,
            HandlerError::Render(RenderError::Validation(_)) => true,
            HandlerError::Render(_) => false,
        }
    }
}

/// Per-source-type document generation
#[async_trait]
pub trait DocumentHandler: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Generated PDF for `request`, or `None` when the provider prints this
    /// type from the manifest row alone
    async fn generate(
        &self,
        request: &PrintRequest,
        office: &Office,
    ) -> Result<Option<RenderedDocument>, HandlerError>;
}
