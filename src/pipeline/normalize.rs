//! Converts system A and system B rows into one canonical, ordered list of
//! patient-file entries for a single admission.

use std::collections::BTreeSet;

use chrono::Duration;
use thiserror::Error;

use super::rtf::{is_rtf, rtf_to_text};
use crate::departments::{DepartmentRegistry, PromptTemplate};
use crate::models::{Admission, PatientFileEntry, SourceRows, SystemARow, SystemBRow};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Patient file for admission {admission_id} has no usable entries")]
pub struct EmptyPatientFile {
    pub admission_id: String,
}

pub struct PatientFileNormalizer {
    min_stay: Duration,
}

impl PatientFileNormalizer {
    pub fn new(min_stay_hours: i64) -> Self {
        Self {
            min_stay: Duration::hours(min_stay_hours.max(0)),
        }
    }

    /// Normalize the rows belonging to `admission`. Rows for other
    /// encounters are ignored. Result is deduplicated and sorted by
    /// (timestamp, category).
    pub fn normalize(
        &self,
        admission: &Admission,
        rows: &SourceRows,
        template: &PromptTemplate,
        registry: &DepartmentRegistry,
    ) -> Result<Vec<PatientFileEntry>, EmptyPatientFile> {
        let markers = registry.excluded_markers();
        let mut entries: BTreeSet<PatientFileEntry> = BTreeSet::new();
        let mut dropped = 0usize;

        match rows {
            SourceRows::SystemA(rows) => {
                for row in rows.iter().filter(|r| r.encounter_id == admission.admission_id) {
                    match system_a_entry(row, template, markers) {
                        Some(entry) => {
                            entries.insert(entry);
                        }
                        None => dropped += 1,
                    }
                }
            }
            SourceRows::SystemB(rows) => {
                for row in rows.iter().filter(|r| r.encounter_id == admission.admission_id) {
                    match system_b_entry(row, template, registry, markers) {
                        Some(entry) => {
                            entries.insert(entry);
                        }
                        None => dropped += 1,
                    }
                }
            }
        }

        let entries: Vec<PatientFileEntry> = entries.into_iter().collect();
        tracing::debug!(
            admission_id = %admission.admission_id,
            source_system = %rows.source_system(),
            kept = entries.len(),
            dropped,
            "Patient file normalized"
        );

        let Some(last) = entries.last() else {
            return Err(EmptyPatientFile {
                admission_id: admission.admission_id.clone(),
            });
        };

        if last.authored_at() - admission.admitted_at < self.min_stay {
            tracing::warn!(
                admission_id = %admission.admission_id,
                min_stay_hours = self.min_stay.num_hours(),
                "All notes fall within the minimum stay; admission should have been excluded upstream"
            );
        }

        Ok(entries)
    }
}

fn has_excluded_marker(label: &str, markers: &[String]) -> bool {
    let lower = label.to_lowercase();
    markers.iter().any(|m| lower.contains(m.as_str()))
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

fn system_a_entry(row: &SystemARow, template: &PromptTemplate, markers: &[String]) -> Option<PatientFileEntry> {
    let category = non_blank(row.category.as_deref())?.trim();
    if has_excluded_marker(category, markers) || !template.contains(category) {
        return None;
    }
    let content = non_blank(row.content.as_deref())?;
    Some(PatientFileEntry::new(category, row.timestamp, content))
}

fn system_b_entry(
    row: &SystemBRow,
    template: &PromptTemplate,
    registry: &DepartmentRegistry,
    markers: &[String],
) -> Option<PatientFileEntry> {
    let label = row.section_name.as_deref().unwrap_or(&row.section_id);
    if has_excluded_marker(label, markers) || has_excluded_marker(&row.section_id, markers) {
        return None;
    }
    let raw = non_blank(row.text.as_deref())?;
    let text = if is_rtf(raw) { rtf_to_text(raw) } else { raw.to_string() };
    if text.trim().is_empty() {
        return None;
    }
    let category = registry.category_for_section(template, &row.section_id);
    Some(PatientFileEntry::new(category, row.date, text))
}
