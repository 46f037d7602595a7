use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde::Serialize;

/// One dated, categorized note in a normalized patient file.
///
/// Fields are private so an entry cannot change after normalization;
/// redaction produces a new entry through [`PatientFileEntry::with_content`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PatientFileEntry {
    category: String,
    authored_at: NaiveDateTime,
    content: String,
}

impl PatientFileEntry {
    pub fn new(category: impl Into<String>, authored_at: NaiveDateTime, content: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            authored_at,
            content: content.into(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn authored_at(&self) -> NaiveDateTime {
        self.authored_at
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn with_content(&self, content: String) -> Self {
        Self {
            category: self.category.clone(),
            authored_at: self.authored_at,
            content,
        }
    }
}

impl Ord for PatientFileEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.authored_at
            .cmp(&other.authored_at)
            .then_with(|| self.category.cmp(&other.category))
            .then_with(|| self.content.cmp(&other.content))
    }
}

impl PartialOrd for PatientFileEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn orders_by_timestamp_then_category() {
        let mut entries = vec![
            PatientFileEntry::new("Respiratie", ts(20, 8), "CPAP"),
            PatientFileEntry::new("Infectie", ts(20, 8), "CRP 12"),
            PatientFileEntry::new("Circulatie", ts(19, 14), "stabiel"),
        ];
        entries.sort();
        let order: Vec<_> = entries.iter().map(|e| e.category()).collect();
        assert_eq!(order, vec!["Circulatie", "Infectie", "Respiratie"]);
    }

    #[test]
    fn with_content_keeps_key() {
        let entry = PatientFileEntry::new("Infectie", ts(19, 9), "Jan heeft koorts");
        let redacted = entry.with_content("[PERSOON-1] heeft koorts".into());
        assert_eq!(redacted.category(), "Infectie");
        assert_eq!(redacted.authored_at(), ts(19, 9));
        assert_eq!(entry.content(), "Jan heeft koorts");
    }
}
