//! Electoral registration office lookup

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EroError {
    #[error("no electoral registration office for gss code {0}")]
    UnknownGssCode(String),

    #[error("office lookup failed: {0}")]
    Unavailable(String),
}

impl EroError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, EroError::UnknownGssCode(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Office {
    pub gss_code: String,
    pub name: String,
}

#[async_trait]
pub trait EroDirectory: Send + Sync {
    async fn office_for(&self, gss_code: &str) -> Result<Office, EroError>;
}

/// Office table loaded from the `[offices]` configuration section
#[derive(Debug, Clone, Default)]
pub struct StaticEroDirectory {
    offices: BTreeMap<String, String>,
}

impl StaticEroDirectory {
    /// GSS codes are matched case-insensitively
    pub fn new(offices: &BTreeMap<String, String>) -> Self {
        Self {
            offices: offices
                .iter()
                .map(|(code, name)| (code.trim().to_ascii_uppercase(), name.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl EroDirectory for StaticEroDirectory {
    async fn office_for(&self, gss_code: &str) -> Result<Office, EroError> {
        let gss_code = gss_code.trim().to_ascii_uppercase();
        match self.offices.get(&gss_code) {
            Some(name) => Ok(Office {
                gss_code,
                name: name.clone(),
            }),
            None => Err(EroError::UnknownGssCode(gss_code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticEroDirectory {
        // The config loader may hand keys back lowercased
        StaticEroDirectory::new(
            &[("e09000007".to_string(), "Camden".to_string())]
                .into_iter()
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let office = directory().office_for("E09000007").await.unwrap();
        assert_eq!(office.gss_code, "E09000007");
        assert_eq!(office.name, "Camden");
    }

    #[tokio::test]
    async fn test_unknown_code_is_permanent() {
        let err = directory().office_for("W06000015").await.unwrap_err();
        assert!(matches!(err, EroError::UnknownGssCode(ref code) if code == "W06000015"));
        assert!(err.is_permanent());
    }
}
