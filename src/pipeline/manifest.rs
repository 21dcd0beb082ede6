//! Print provider manifest: one pipe-separated row per print request

use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use crate::models::PrintRequestDescriptor;

const FILE_PREFIX: &str = "electoral-print";

pub fn manifest_name(batch_id: &str) -> String {
    format!("{FILE_PREFIX}-{batch_id}.psv")
}

pub fn archive_name(batch_id: &str) -> String {
    format!("{FILE_PREFIX}-{batch_id}.zip")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRow {
    pub request_id: String,
    pub source_type: String,
    pub source_reference: String,
    pub certificate_number: String,
    pub gss_code: String,
    pub office_name: String,
    pub elector_name: String,
    pub photo: String,
    pub document: Option<String>,
}

impl From<&PrintRequestDescriptor> for ManifestRow {
    fn from(d: &PrintRequestDescriptor) -> Self {
        Self {
            request_id: d.request_id.clone(),
            source_type: d.source_type.as_str().to_string(),
            source_reference: d.source_reference.clone(),
            certificate_number: d.certificate_number.clone(),
            gss_code: d.gss_code.clone(),
            office_name: d.office_name.clone(),
            elector_name: d.elector_name.clone(),
            photo: d.photo.clone(),
            document: d.document.clone(),
        }
    }
}

pub fn write_psv(descriptors: &[PrintRequestDescriptor]) -> Result<Vec<u8>, PipelineError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'|')
        .from_writer(Vec::new());

    for descriptor in descriptors {
        writer.serialize(ManifestRow::from(descriptor))?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))
}

pub fn read_psv(bytes: &[u8]) -> Result<Vec<ManifestRow>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new().delimiter(b'|').from_reader(bytes);
    let rows = reader.deserialize().collect::<Result<Vec<ManifestRow>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    fn descriptor(id: &str, document: Option<&str>) -> PrintRequestDescriptor {
        PrintRequestDescriptor {
            request_id: id.to_string(),
            source_type: SourceType::TemporaryCertificate,
            source_reference: format!("app-{id}"),
            certificate_number: "TC-1".to_string(),
            gss_code: "E09000007".to_string(),
            office_name: "Camden".to_string(),
            elector_name: "O'Brien | Smith".to_string(),
            photo: "abc.png".to_string(),
            document: document.map(str::to_string),
        }
    }

    #[test]
    fn test_names_derive_from_batch_id() {
        assert_eq!(manifest_name("b1"), "electoral-print-b1.psv");
        assert_eq!(archive_name("b1"), "electoral-print-b1.zip");
    }

    #[test]
    fn test_header_and_delimiter() {
        let bytes = write_psv(&[descriptor("pr_1", Some("pr_1.pdf"))]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let header = text.lines().next().unwrap();

        assert_eq!(
            header,
            "requestId|sourceType|sourceReference|certificateNumber|gssCode|officeName|electorName|photo|document"
        );
        assert!(text.contains("TEMPORARY_CERTIFICATE"));
    }

    #[test]
    fn test_embedded_delimiters_survive() {
        let rows = vec![descriptor("pr_1", Some("pr_1.pdf")), descriptor("pr_2", None)];
        let parsed = read_psv(&write_psv(&rows).unwrap()).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].elector_name, "O'Brien | Smith");
        assert_eq!(parsed[1].document, None);
    }
}
