use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clinician feedback on a generated letter, stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub admission_id: String,
    pub letter_id: Option<Uuid>,
    pub question: String,
    pub answer: String,
    pub rating: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub logged_at: DateTime<Utc>,
    pub method: String,
    pub endpoint: String,
    pub status: u16,
    pub runtime_ms: u64,
    pub api_version: String,
}
