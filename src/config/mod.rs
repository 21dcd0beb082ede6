//! Configuration management for the print batch service
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `ELECTOR_PRINT__<section>__<key>`
//!
//! Examples:
//! - `ELECTOR_PRINT__BATCH__SIZE=100`
//! - `ELECTOR_PRINT__BATCH__SCHEDULE="0 0 * * * *"`
//! - `ELECTOR_PRINT__CERTIFICATE__MAX_ADVANCE_DAYS=14`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/elector-print.toml`.
//! This can be overridden using the `ELECTOR_PRINT_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    BatchConfig, CertificateConfig, Config, DeliveryConfig, PhotoConfig, ServerConfig,
    StorageConfig, StorageProvider, TimeoutConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment), reading the
    /// TOML file from `path` when given
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or any value
    /// fails validation (batch size, cron expression, lock settings, ...)
    pub fn load_with(path: Option<std::path::PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Parsed cron schedule for the batch job
    pub fn schedule(&self) -> Result<cron::Schedule, ValidationError> {
        use std::str::FromStr;
        cron::Schedule::from_str(&self.batch.schedule).map_err(|e| {
            ValidationError::InvalidSchedule {
                expression: self.batch.schedule.clone(),
                reason: e.to_string(),
            }
        })
    }
}
