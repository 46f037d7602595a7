use thiserror::Error;

use super::normalize::EmptyPatientFile;
use super::prompt::LengthError;
use super::redaction::RedactionError;
use crate::db::DatabaseError;
use crate::models::enums::AttemptStatus;

/// Why an admission did not end with a successful letter.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Redaction failed: {0}")]
    Redaction(#[from] RedactionError),

    #[error(transparent)]
    EmptyPatientFile(#[from] EmptyPatientFile),

    #[error(transparent)]
    Length(#[from] LengthError),

    #[error("Model call failed: {0}")]
    Model(String),

    #[error("Model response rejected: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Unknown department: {0}")]
    UnknownDepartment(String),
}

impl PipelineError {
    pub fn attempt_status(&self) -> AttemptStatus {
        match self {
            Self::Redaction(_) => AttemptStatus::RedactionError,
            Self::EmptyPatientFile(_) => AttemptStatus::EmptyPatientFile,
            Self::Length(_) => AttemptStatus::LengthError,
            Self::Model(_) => AttemptStatus::ModelError,
            Self::Validation(_) => AttemptStatus::ValidationError,
            Self::Storage(_) => AttemptStatus::StorageError,
            Self::UnknownDepartment(_) => AttemptStatus::UnknownDepartment,
        }
    }

    /// Whether the next scheduled run should try this admission again.
    /// Length and configuration problems need a person; empty files are
    /// picked up again once new notes arrive.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Model(_) | Self::Validation(_) | Self::Storage(_))
    }
}
