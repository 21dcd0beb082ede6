use thiserror::Error;

use crate::models::PrintRequestStatus;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Print request not found: {0}")]
    RequestNotFound(String),

    #[error("Print request already exists: {0}")]
    DuplicateRequest(String),

    #[error("Illegal status transition {from} -> {to}")]
    IllegalTransition {
        from: PrintRequestStatus,
        to: PrintRequestStatus,
    },

    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
