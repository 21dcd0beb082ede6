use async_trait::async_trait;

use super::traits::{DocumentHandler, HandlerError};
use crate::ero::Office;
use crate::models::{PrintRequest, RenderedDocument, SourceType};

/// Voter authority certificates are printed by the provider from the
/// manifest row and photo; no PDF is generated here
#[derive(Debug, Clone, Copy, Default)]
pub struct VoterCardHandler;

#[async_trait]
impl DocumentHandler for VoterCardHandler {
    fn source_type(&self) -> SourceType {
        SourceType::VoterCard
    }

    async fn generate(
        &self,
        _request: &PrintRequest,
        _office: &Office,
    ) -> Result<Option<RenderedDocument>, HandlerError> {
        Ok(None)
    }
}
