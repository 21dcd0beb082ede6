//! Document rendering: template files filled with placeholder values into PDF bytes

mod pdf;
mod template;

pub use template::{RenderedLine, Template};

use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::models::TemplateDetails;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot read template {path}: {source}")]
    TemplateIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("template {path} is malformed at line {line}: {reason}")]
    Malformed {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

/// Loads templates from a directory and renders them to PDF
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template_dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    pub fn load(&self, path: &str) -> Result<Template, RenderError> {
        let full_path = self.template_dir.join(path);
        let source =
            std::fs::read_to_string(&full_path).map_err(|source| RenderError::TemplateIo {
                path: full_path.display().to_string(),
                source,
            })?;
        Template::parse(path, &source)
    }

    /// Render `details.path` with `details.placeholders`
    ///
    /// Every token in the template must be mapped, otherwise this fails with
    /// [`ValidationError::TemplateMissingValue`] before any PDF is produced.
    pub fn render(&self, details: &TemplateDetails) -> Result<Vec<u8>, RenderError> {
        let template = self.load(&details.path)?;
        let lines = template.fill(&details.placeholders)?;
        let title = lines
            .iter()
            .find(|line| line.heading)
            .map(|line| line.text.as_str())
            .unwrap_or(template.path());

        let bytes = pdf::write_pdf(title, &lines)?;
        debug!(template = %details.path, size = bytes.len(), "Rendered document");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn renderer_with(template: &str) -> (TemplateRenderer, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("doc.tpl"), template).unwrap();
        (TemplateRenderer::new(temp_dir.path()), temp_dir)
    }

    fn details(pairs: &[(&str, &str)]) -> TemplateDetails {
        TemplateDetails {
            path: "doc.tpl".to_string(),
            placeholders: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_render_is_byte_identical_for_identical_input() {
        let (renderer, _temp) = renderer_with("# Certificate\nName: {{name}}");
        let details = details(&[("name", "Ada Lovelace")]);

        let first = renderer.render(&details).unwrap();
        let second = renderer.render(&details).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_values_give_different_bytes() {
        let (renderer, _temp) = renderer_with("Name: {{name}}");
        let a = renderer.render(&details(&[("name", "A")])).unwrap();
        let b = renderer.render(&details(&[("name", "B")])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_value_fails_fast() {
        let (renderer, _temp) = renderer_with("Name: {{name}}\nCode: {{gss_code}}");
        let err = renderer.render(&details(&[("name", "A")])).unwrap_err();

        assert!(matches!(
            err,
            RenderError::Validation(ValidationError::TemplateMissingValue { ref key, .. }) if key == "gss_code"
        ));
    }

    #[test]
    fn test_missing_template_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let renderer = TemplateRenderer::new(temp_dir.path());
        let err = renderer.render(&details(&[])).unwrap_err();
        assert!(matches!(err, RenderError::TemplateIo { .. }));
    }
}
