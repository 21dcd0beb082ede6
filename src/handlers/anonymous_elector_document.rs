use async_trait::async_trait;

use super::traits::{DocumentHandler, HandlerError};
use super::{document_name, document_placeholders};
use crate::ero::Office;
use crate::models::{PrintRequest, RenderedDocument, SourceType, TemplateDetails};
use crate::render::TemplateRenderer;

#[derive(Debug, Clone)]
pub struct AnonymousElectorDocumentHandler {
    renderer: TemplateRenderer,
    template: String,
}

impl AnonymousElectorDocumentHandler {
    pub fn new(renderer: TemplateRenderer, template: impl Into<String>) -> Self {
        Self {
            renderer,
            template: template.into(),
        }
    }
}

#[async_trait]
impl DocumentHandler for AnonymousElectorDocumentHandler {
    fn source_type(&self) -> SourceType {
        SourceType::AnonymousElectorDocument
    }

    async fn generate(
        &self,
        request: &PrintRequest,
        office: &Office,
    ) -> Result<Option<RenderedDocument>, HandlerError> {
        let details = TemplateDetails {
            path: self.template.clone(),
            placeholders: document_placeholders(request, office),
        };

        Ok(Some(RenderedDocument {
            name: document_name(request),
            content: self.renderer.render(&details)?,
        }))
    }
}
