use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::{AttemptStatus, SourceSystem};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Admission {admission_id} already ended at {existing}")]
    AlreadyFinished {
        admission_id: String,
        existing: NaiveDateTime,
    },

    #[error("Admission {admission_id} cannot end before it starts")]
    EndBeforeStart { admission_id: String },
}

/// One hospital stay, identified by the source system's encounter id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admission {
    pub admission_id: String,
    /// Pseudonymized, never the hospital number itself.
    pub patient_id: String,
    pub department: String,
    pub admitted_at: NaiveDateTime,
    pub discharged_at: Option<NaiveDateTime>,
    pub source_system: SourceSystem,
}

impl Admission {
    /// A running admission without an end.
    pub fn new(
        admission_id: impl Into<String>,
        patient_id: impl Into<String>,
        department: impl Into<String>,
        admitted_at: NaiveDateTime,
        source_system: SourceSystem,
    ) -> Self {
        Self {
            admission_id: admission_id.into(),
            patient_id: patient_id.into(),
            department: department.into(),
            admitted_at,
            discharged_at: None,
            source_system,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.discharged_at.is_some()
    }

    /// Set the admission end. Setting the same end twice is a no-op; a
    /// different end on a finished admission is rejected.
    pub fn finish(&mut self, at: NaiveDateTime) -> Result<(), AdmissionError> {
        if at < self.admitted_at {
            return Err(AdmissionError::EndBeforeStart {
                admission_id: self.admission_id.clone(),
            });
        }
        match self.discharged_at {
            Some(existing) if existing != at => Err(AdmissionError::AlreadyFinished {
                admission_id: self.admission_id.clone(),
                existing,
            }),
            _ => {
                self.discharged_at = Some(at);
                Ok(())
            }
        }
    }
}

/// Admission as persisted, with the bookkeeping of the last pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub admission: Admission,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_status: Option<AttemptStatus>,
}
