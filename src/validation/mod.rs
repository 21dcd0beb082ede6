//! Business-rule validation for print documents
//!
//! The date rule for temporary certificates is exposed through two channels:
//!
//! - [`DateValidator::collect`] pushes field-level errors so request-body
//!   validation can report everything wrong at once
//! - [`DateValidator::ensure`] fails on the first violation, for internal
//!   enforcement right before a document is generated
//!
//! Both go through [`DateWindow::check`], computed from a single reading of
//! the clock per call.

mod clock;

pub use clock::{Clock, FixedClock, SystemClock};

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("date {date} cannot be in the past")]
    DateInPast { date: NaiveDate },

    #[error("date {date} cannot be after {latest}")]
    DateTooFarInFuture { date: NaiveDate, latest: NaiveDate },

    #[error("template '{template}' has no value for placeholder '{key}'")]
    TemplateMissingValue { template: String, key: String },
}

impl ValidationError {
    /// Message without the offending value, for field-level reporting
    pub fn field_message(&self) -> String {
        match self {
            ValidationError::DateInPast { .. } => "cannot be in the past".to_string(),
            ValidationError::DateTooFarInFuture { latest, .. } => {
                format!("cannot be after {latest}")
            }
            ValidationError::TemplateMissingValue { key, .. } => {
                format!("missing value for '{key}'")
            }
        }
    }
}

/// One rejected request-body field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Inclusive range of dates a document may be issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub today: NaiveDate,
    pub latest: NaiveDate,
}

impl DateWindow {
    pub fn starting(today: NaiveDate, max_advance_days: u32) -> Self {
        let latest = today
            .checked_add_days(Days::new(u64::from(max_advance_days)))
            .unwrap_or(NaiveDate::MAX);
        Self { today, latest }
    }

    pub fn check(&self, date: NaiveDate) -> Result<(), ValidationError> {
        if date < self.today {
            return Err(ValidationError::DateInPast { date });
        }
        if date > self.latest {
            return Err(ValidationError::DateTooFarInFuture {
                date,
                latest: self.latest,
            });
        }
        Ok(())
    }
}

/// Validates `validOnDate` against the clock and the configured advance window
#[derive(Clone)]
pub struct DateValidator {
    clock: Arc<dyn Clock>,
    max_advance_days: u32,
}

impl DateValidator {
    pub fn new(clock: Arc<dyn Clock>, max_advance_days: u32) -> Self {
        Self {
            clock,
            max_advance_days,
        }
    }

    pub fn max_advance_days(&self) -> u32 {
        self.max_advance_days
    }

    pub fn window(&self) -> DateWindow {
        DateWindow::starting(self.clock.today(), self.max_advance_days)
    }

    /// Fail fast on the first violation
    pub fn ensure(&self, date: NaiveDate) -> Result<DateWindow, ValidationError> {
        let window = self.window();
        window.check(date)?;
        Ok(window)
    }

    /// Record a violation against `field` and keep going
    pub fn collect(
        &self,
        field: &str,
        date: NaiveDate,
        errors: &mut Vec<FieldError>,
    ) -> Option<DateWindow> {
        let window = self.window();
        match window.check(date) {
            Ok(()) => Some(window),
            Err(err) => {
                errors.push(FieldError::new(field, err.field_message()));
                None
            }
        }
    }
}
