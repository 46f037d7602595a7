use std::collections::BTreeSet;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Environment, LetterOutcome};

/// Generated text for one clinical category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterSection {
    pub category: String,
    pub text: String,
}

/// One generation attempt for an admission. Never updated in place: a newer
/// attempt supersedes it through the store's current pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedLetter {
    pub id: Uuid,
    pub admission_id: String,
    pub department: String,
    pub environment: Environment,
    pub generated_at: DateTime<Utc>,
    pub outcome: LetterOutcome,
    /// In department category order. Empty unless the outcome is a success.
    pub sections: Vec<LetterSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    pub input_tokens: Option<usize>,
    pub error_detail: Option<String>,
    pub is_current: bool,
}

impl GeneratedLetter {
    pub fn new(
        admission_id: impl Into<String>,
        department: impl Into<String>,
        environment: Environment,
        outcome: LetterOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            admission_id: admission_id.into(),
            department: department.into(),
            environment,
            // Stored with microsecond precision
            generated_at: Utc::now().trunc_subsecs(6),
            outcome,
            sections: Vec::new(),
            raw_response: None,
            input_tokens: None,
            error_detail: None,
            is_current: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn category_keys(&self) -> BTreeSet<&str> {
        self.sections.iter().map(|s| s.category.as_str()).collect()
    }

    pub fn section(&self, category: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.category == category)
            .map(|s| s.text.as_str())
    }
}
