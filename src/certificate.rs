//! On-demand temporary certificate generation
//!
//! A [`GenerateTemporaryCertificateRequest`] arrives with every field
//! optional. [`GenerateTemporaryCertificateRequest::validate`] reports all
//! problems at once and yields a [`GenerateTemporaryCertificateDto`];
//! [`TemporaryCertificateGenerator::generate`] then re-checks the date on the
//! fail-fast channel before rendering, since time may have passed in between.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::ero::{EroDirectory, EroError};
use crate::handlers::validity_placeholders;
use crate::models::{Placeholders, TemplateDetails};
use crate::render::{RenderError, TemplateRenderer};
use crate::validation::{DateValidator, FieldError, ValidationError};

const CERTIFICATE_NUMBER_LENGTH: usize = 20;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("invalid request: {}", describe(.0))]
    InvalidRequest(Vec<FieldError>),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Office(#[from] EroError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTemporaryCertificateRequest {
    pub gss_code: Option<String>,
    pub source_reference: Option<String>,
    pub elector_name: Option<String>,
    pub valid_on_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateTemporaryCertificateDto {
    pub gss_code: String,
    pub source_reference: String,
    pub elector_name: String,
    pub valid_on_date: NaiveDate,
}

fn required(field: &str, value: Option<String>, errors: &mut Vec<FieldError>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            errors.push(FieldError::new(field, "must not be blank"));
            String::new()
        }
    }
}

impl GenerateTemporaryCertificateRequest {
    /// Check every field, collecting all violations
    pub fn validate(
        self,
        validator: &DateValidator,
    ) -> Result<GenerateTemporaryCertificateDto, CertificateError> {
        let mut errors = Vec::new();

        let gss_code = required("gssCode", self.gss_code, &mut errors);
        let source_reference = required("sourceReference", self.source_reference, &mut errors);
        let elector_name = required("electorName", self.elector_name, &mut errors);

        let valid_on_date = match self.valid_on_date {
            Some(date) => {
                validator.collect("validOnDate", date, &mut errors);
                Some(date)
            }
            None => {
                errors.push(FieldError::new("validOnDate", "must not be null"));
                None
            }
        };

        match valid_on_date {
            Some(valid_on_date) if errors.is_empty() => Ok(GenerateTemporaryCertificateDto {
                gss_code,
                source_reference,
                elector_name,
                valid_on_date,
            }),
            _ => Err(CertificateError::InvalidRequest(errors)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedCertificate {
    pub certificate_number: String,
    pub file_name: String,
    pub pdf: Vec<u8>,
}

/// Renders a single temporary certificate outside the batch pipeline
#[derive(Clone)]
pub struct TemporaryCertificateGenerator {
    ero: Arc<dyn EroDirectory>,
    renderer: TemplateRenderer,
    validator: DateValidator,
    template: String,
}

impl TemporaryCertificateGenerator {
    pub fn new(
        ero: Arc<dyn EroDirectory>,
        renderer: TemplateRenderer,
        validator: DateValidator,
        template: impl Into<String>,
    ) -> Self {
        Self {
            ero,
            renderer,
            validator,
            template: template.into(),
        }
    }

    pub async fn generate(
        &self,
        dto: &GenerateTemporaryCertificateDto,
    ) -> Result<GeneratedCertificate, CertificateError> {
        let window = self.validator.ensure(dto.valid_on_date)?;
        let office = self.ero.office_for(&dto.gss_code).await?;
        let certificate_number = new_certificate_number();

        let mut placeholders = Placeholders::new();
        placeholders.insert("elector_name".to_string(), dto.elector_name.clone());
        placeholders.insert("gss_code".to_string(), office.gss_code.clone());
        placeholders.insert("office_name".to_string(), office.name.clone());
        placeholders.insert("certificate_number".to_string(), certificate_number.clone());
        validity_placeholders(&mut placeholders, dto.valid_on_date, &window);

        let pdf = self.renderer.render(&TemplateDetails {
            path: self.template.clone(),
            placeholders,
        })?;

        info!(
            source_reference = %dto.source_reference,
            gss_code = %office.gss_code,
            %certificate_number,
            "Temporary certificate generated"
        );

        Ok(GeneratedCertificate {
            file_name: format!("temporary-certificate-{certificate_number}.pdf"),
            certificate_number,
            pdf,
        })
    }
}

fn new_certificate_number() -> String {
    let mut number = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    number.truncate(CERTIFICATE_NUMBER_LENGTH);
    number
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ero::StaticEroDirectory;
    use crate::validation::FixedClock;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn validator() -> DateValidator {
        DateValidator::new(Arc::new(FixedClock::on(date(2023, 2, 4))), 10)
    }

    fn valid_request() -> GenerateTemporaryCertificateRequest {
        GenerateTemporaryCertificateRequest {
            gss_code: Some("E09000007".to_string()),
            source_reference: Some("app-1".to_string()),
            elector_name: Some("Ada Lovelace".to_string()),
            valid_on_date: Some(date(2023, 2, 6)),
        }
    }

    fn generator() -> (TemporaryCertificateGenerator, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("tc.tpl"),
            "# Temporary Certificate\n{{elector_name}} {{certificate_number}}\n\
             {{office_name}} ({{gss_code}}) valid {{valid_on_date}} issued {{issue_date}}",
        )
        .unwrap();

        let offices = [("E09000007".to_string(), "Camden".to_string())]
            .into_iter()
            .collect();
        let generator = TemporaryCertificateGenerator::new(
            Arc::new(StaticEroDirectory::new(&offices)),
            TemplateRenderer::new(temp_dir.path()),
            validator(),
            "tc.tpl",
        );
        (generator, temp_dir)
    }

    #[test]
    fn test_valid_request_becomes_dto() {
        let dto = valid_request().validate(&validator()).unwrap();
        assert_eq!(dto.gss_code, "E09000007");
        assert_eq!(dto.valid_on_date, date(2023, 2, 6));
    }

    #[test]
    fn test_all_field_errors_are_collected() {
        let request = GenerateTemporaryCertificateRequest {
            elector_name: Some("   ".to_string()),
            valid_on_date: Some(date(2023, 2, 15)),
            ..valid_request()
        };

        let Err(CertificateError::InvalidRequest(errors)) = request.validate(&validator()) else {
            panic!("expected field errors");
        };
        assert_eq!(
            errors,
            vec![
                FieldError::new("electorName", "must not be blank"),
                FieldError::new("validOnDate", "cannot be after 2023-02-14"),
            ]
        );
    }

    #[test]
    fn test_missing_date_is_reported() {
        let request = GenerateTemporaryCertificateRequest {
            valid_on_date: None,
            ..valid_request()
        };
        let err = request.validate(&validator()).unwrap_err();
        assert!(err.to_string().contains("validOnDate must not be null"));
    }

    #[tokio::test]
    async fn test_generate_renders_certificate() {
        let (generator, _temp) = generator();
        let dto = valid_request().validate(&validator()).unwrap();

        let certificate = generator.generate(&dto).await.unwrap();
        assert_eq!(certificate.certificate_number.len(), CERTIFICATE_NUMBER_LENGTH);
        assert!(certificate.file_name.ends_with(".pdf"));
        assert!(certificate.pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_generate_rechecks_date() {
        let (generator, _temp) = generator();
        let dto = GenerateTemporaryCertificateDto {
            gss_code: "E09000007".to_string(),
            source_reference: "app-1".to_string(),
            elector_name: "Ada Lovelace".to_string(),
            valid_on_date: date(2023, 2, 1),
        };

        let err = generator.generate(&dto).await.unwrap_err();
        assert!(matches!(
            err,
            CertificateError::Validation(ValidationError::DateInPast { .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_unknown_office() {
        let (generator, _temp) = generator();
        let dto = GenerateTemporaryCertificateDto {
            gss_code: "W06000015".to_string(),
            ..valid_request().validate(&validator()).unwrap()
        };

        let err = generator.generate(&dto).await.unwrap_err();
        assert!(matches!(err, CertificateError::Office(EroError::UnknownGssCode(_))));
    }
}
