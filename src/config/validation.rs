use super::models::{Config, StorageProvider};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("batch.size must be positive")]
    InvalidBatchSize,

    #[error("batch.schedule '{expression}' is not a valid cron expression: {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("batch.lock_name must not be empty")]
    EmptyLockName,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("batch.photo_prefetch must be positive")]
    InvalidPrefetch,

    #[error("photos.base_url '{0}' must start with http:// or https://")]
    InvalidPhotoBaseUrl(String),

    #[error("{field} must not be empty")]
    EmptyBucket { field: &'static str },

    #[error("Storage provider is S3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_batch(config)?;
    validate_photos(config)?;
    validate_delivery(config)?;
    validate_timeouts(config)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_batch(config: &Config) -> Result<(), ValidationError> {
    let batch = &config.batch;

    if batch.size == 0 {
        return Err(ValidationError::InvalidBatchSize);
    }

    cron::Schedule::from_str(&batch.schedule).map_err(|e| ValidationError::InvalidSchedule {
        expression: batch.schedule.clone(),
        reason: e.to_string(),
    })?;

    if batch.lock_name.trim().is_empty() {
        return Err(ValidationError::EmptyLockName);
    }

    if batch.lock_ttl.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "batch.lock_ttl",
        });
    }

    if batch.photo_prefetch == 0 {
        return Err(ValidationError::InvalidPrefetch);
    }

    Ok(())
}

fn validate_photos(config: &Config) -> Result<(), ValidationError> {
    let base_url = &config.photos.base_url;
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ValidationError::InvalidPhotoBaseUrl(base_url.clone()));
    }

    if config.photos.source_bucket.trim().is_empty() {
        return Err(ValidationError::EmptyBucket {
            field: "photos.source_bucket",
        });
    }

    Ok(())
}

fn validate_delivery(config: &Config) -> Result<(), ValidationError> {
    if config.delivery.bucket.trim().is_empty() {
        return Err(ValidationError::EmptyBucket {
            field: "delivery.bucket",
        });
    }
    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.store", timeouts.store),
        ("timeouts.storage", timeouts.storage),
        ("timeouts.upload", timeouts.upload),
    ] {
        if value.is_zero() {
            return Err(ValidationError::ZeroDuration { field });
        }
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.provider == StorageProvider::S3
        && (config.storage.access_key.is_none() || config.storage.secret_key.is_none())
    {
        return Err(ValidationError::MissingS3Credentials);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.batch.size = 0;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidBatchSize)));
    }

    #[test]
    fn test_bad_cron_rejected() {
        let mut config = Config::default();
        config.batch.schedule = "every fifteen minutes".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn test_blank_lock_name_rejected() {
        let mut config = Config::default();
        config.batch.lock_name = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyLockName)));
    }

    #[test]
    fn test_photo_base_url_must_be_http() {
        let mut config = Config::default();
        config.photos.base_url = "ftp://photos".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidPhotoBaseUrl(_))
        ));
    }

    #[test]
    fn test_s3_requires_credentials() {
        let mut config = Config::default();
        config.storage.provider = StorageProvider::S3;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingS3Credentials)
        ));

        config.storage.access_key = Some("key".to_string());
        config.storage.secret_key = Some("secret".to_string());
        assert!(validate(&config).is_ok());
    }
}
