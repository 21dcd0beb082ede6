use async_trait::async_trait;
use chrono::NaiveDate;

use super::traits::{DocumentHandler, HandlerError};
use super::{document_name, document_placeholders};
use crate::ero::Office;
use crate::models::{Placeholders, PrintRequest, RenderedDocument, SourceType, TemplateDetails};
use crate::render::TemplateRenderer;
use crate::validation::{DateValidator, DateWindow};

/// Printed date format on certificates
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// Temporary certificates carry an explicit validity date, re-checked
/// against the advance window right before the PDF is produced
#[derive(Clone)]
pub struct TemporaryCertificateHandler {
    renderer: TemplateRenderer,
    template: String,
    validator: DateValidator,
}

impl TemporaryCertificateHandler {
    pub fn new(
        renderer: TemplateRenderer,
        template: impl Into<String>,
        validator: DateValidator,
    ) -> Self {
        Self {
            renderer,
            template: template.into(),
            validator,
        }
    }
}

/// Validity placeholders, taken from the same window the date was checked in
pub fn validity_placeholders(
    placeholders: &mut Placeholders,
    valid_on_date: NaiveDate,
    window: &DateWindow,
) {
    placeholders.insert(
        "valid_on_date".to_string(),
        valid_on_date.format(DISPLAY_DATE_FORMAT).to_string(),
    );
    placeholders.insert(
        "issue_date".to_string(),
        window.today.format(DISPLAY_DATE_FORMAT).to_string(),
    );
}

#[async_trait]
impl DocumentHandler for TemporaryCertificateHandler {
    fn source_type(&self) -> SourceType {
        SourceType::TemporaryCertificate
    }

    async fn generate(
        &self,
        request: &PrintRequest,
        office: &Office,
    ) -> Result<Option<RenderedDocument>, HandlerError> {
        let valid_on_date = request
            .valid_on_date
            .ok_or_else(|| HandlerError::MissingValidOnDate(request.id.clone()))?;
        let window = self.validator.ensure(valid_on_date)?;

        let mut placeholders = document_placeholders(request, office);
        validity_placeholders(&mut placeholders, valid_on_date, &window);

        let details = TemplateDetails {
            path: self.template.clone(),
            placeholders,
        };

        Ok(Some(RenderedDocument {
            name: document_name(request),
            content: self.renderer.render(&details)?,
        }))
    }
}
