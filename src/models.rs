//! Domain types shared by the print pipeline
//!
//! Print requests are owned by the ledger; the pipeline only moves them along
//! the status lifecycle and derives ephemeral batch artifacts from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type Placeholders = BTreeMap<String, String>;

/// Kind of document a print request produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    AnonymousElectorDocument,
    VoterCard,
    TemporaryCertificate,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::AnonymousElectorDocument => "ANONYMOUS_ELECTOR_DOCUMENT",
            SourceType::VoterCard => "VOTER_CARD",
            SourceType::TemporaryCertificate => "TEMPORARY_CERTIFICATE",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Print request lifecycle
///
/// `Pending -> Batched -> Dispatched`, with `Failed` reachable from
/// `Pending` or `Batched`. No other transition is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintRequestStatus {
    Pending,
    Batched,
    Dispatched,
    Failed,
}

impl PrintRequestStatus {
    pub fn can_transition_to(self, next: PrintRequestStatus) -> bool {
        use PrintRequestStatus::*;
        matches!(
            (self, next),
            (Pending, Batched) | (Batched, Dispatched) | (Pending, Failed) | (Batched, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrintRequestStatus::Pending => "PENDING",
            PrintRequestStatus::Batched => "BATCHED",
            PrintRequestStatus::Dispatched => "DISPATCHED",
            PrintRequestStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PrintRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the applicant photo lives in object storage.
/// A missing bucket means the configured default photo bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoReference {
    #[serde(default)]
    pub bucket: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRequest {
    pub id: String,
    pub source_type: SourceType,
    /// Foreign application id
    pub source_reference: String,
    pub gss_code: String,
    pub certificate_number: String,
    pub status: PrintRequestStatus,
    pub photo: PhotoReference,
    #[serde(default)]
    pub placeholders: Placeholders,
    pub created_at: DateTime<Utc>,
    /// Only set for temporary certificates
    #[serde(default)]
    pub valid_on_date: Option<NaiveDate>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    pub status_updated_at: DateTime<Utc>,
}

impl PrintRequest {
    /// Elector name, when the request carries a non-blank one
    pub fn elector_name(&self) -> Option<&str> {
        self.placeholders
            .get("elector_name")
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
    }
}

/// Print requests claimed together for one pipeline run
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub requests: Vec<PrintRequest>,
    pub max_size: usize,
}

impl Batch {
    pub fn empty(id: String, max_size: usize) -> Self {
        Self {
            id,
            requests: Vec::new(),
            max_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.id.clone()).collect()
    }
}

/// Resolved photo: archive entry name plus the source to fetch it from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhotoLocation {
    pub destination: String,
    pub source_bucket: String,
    pub source_path: String,
}

/// One manifest row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintRequestDescriptor {
    pub request_id: String,
    pub source_type: SourceType,
    pub source_reference: String,
    pub certificate_number: String,
    pub gss_code: String,
    pub office_name: String,
    pub elector_name: String,
    pub photo: String,
    /// Archive entry of the generated PDF, when the source type has one
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub name: String,
    pub content: Vec<u8>,
}

/// Everything the packager needs for one batch
#[derive(Debug, Clone)]
pub struct FileDetails {
    pub batch_id: String,
    pub manifest_name: String,
    pub archive_name: String,
    pub descriptors: Vec<PrintRequestDescriptor>,
    pub photos: Vec<PhotoLocation>,
    pub documents: Vec<RenderedDocument>,
}

impl FileDetails {
    pub fn request_ids(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.request_id.clone()).collect()
    }

    /// Every archive entry name the manifest refers to, plus the manifest itself
    pub fn entry_names(&self) -> Vec<String> {
        let mut names = vec![self.manifest_name.clone()];
        names.extend(self.documents.iter().map(|d| d.name.clone()));
        names.extend(self.photos.iter().map(|p| p.destination.clone()));
        names
    }
}

/// Template plus the values for its placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDetails {
    pub path: String,
    pub placeholders: Placeholders,
}
