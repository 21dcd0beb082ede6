//! Document generation, one handler per print request source type
//!
//! - [`DocumentHandler`] - per-type generation contract
//! - [`HandlerRegistry`] - lookup by [`SourceType`]; a type without a
//!   handler fails with [`HandlerError::UnsupportedSourceType`]
//!
//! ```rust,ignore
//! let registry = HandlerRegistry::with_defaults(renderer, validator, &config.certificate);
//! let handler = registry.get(request.source_type)?;
//! let document = handler.generate(&request, &office).await?;
//! ```

mod anonymous_elector_document;
mod registry;
mod temporary_certificate;
mod traits;
mod voter_card;

pub use anonymous_elector_document::AnonymousElectorDocumentHandler;
pub use registry::HandlerRegistry;
pub use temporary_certificate::{
    DISPLAY_DATE_FORMAT, TemporaryCertificateHandler, validity_placeholders,
};
pub use traits::{DocumentHandler, HandlerError};
pub use voter_card::VoterCardHandler;

use crate::ero::Office;
use crate::models::{Placeholders, PrintRequest};

/// Archive entry name of a request's generated PDF
pub fn document_name(request: &PrintRequest) -> String {
    format!("{}.pdf", request.id)
}

/// Request placeholders plus the identity fields every document prints.
/// Identity fields always come from the request and the office lookup.
/// A blank elector name is left unmapped so rendering fails on it.
pub fn document_placeholders(request: &PrintRequest, office: &Office) -> Placeholders {
    let mut placeholders = request.placeholders.clone();
    placeholders.remove("elector_name");
    if let Some(name) = request.elector_name() {
        placeholders.insert("elector_name".to_string(), name.to_string());
    }
    placeholders.insert("gss_code".to_string(), office.gss_code.clone());
    placeholders.insert("office_name".to_string(), office.name.clone());
    placeholders.insert(
        "certificate_number".to_string(),
        request.certificate_number.clone(),
    );
    placeholders
}
