use std::collections::BTreeMap;
use std::sync::Arc;

use super::traits::{DocumentHandler, HandlerError};
use super::{AnonymousElectorDocumentHandler, TemporaryCertificateHandler, VoterCardHandler};
use crate::config::CertificateConfig;
use crate::models::SourceType;
use crate::render::TemplateRenderer;
use crate::validation::DateValidator;

/// Source type -> handler lookup
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<SourceType, Arc<dyn DocumentHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own source type, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn DocumentHandler>) {
        self.handlers.insert(handler.source_type(), handler);
    }

    pub fn get(&self, source_type: SourceType) -> Result<Arc<dyn DocumentHandler>, HandlerError> {
        self.handlers
            .get(&source_type)
            .cloned()
            .ok_or(HandlerError::UnsupportedSourceType(source_type))
    }

    /// Registry with a handler for every source type
    pub fn with_defaults(
        renderer: TemplateRenderer,
        validator: DateValidator,
        config: &CertificateConfig,
    ) -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(VoterCardHandler));
        registry.register(Arc::new(AnonymousElectorDocumentHandler::new(
            renderer.clone(),
            config.anonymous_elector_document_template.clone(),
        )));
        registry.register(Arc::new(TemporaryCertificateHandler::new(
            renderer,
            config.temporary_certificate_template.clone(),
            validator,
        )));

        registry
    }
}
