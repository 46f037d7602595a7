use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use super::enums::SourceSystem;

/// Free-text measurement row as exported from system A.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemARow {
    #[serde(deserialize_with = "string_or_number")]
    pub encounter_id: String,
    pub category: Option<String>,
    pub timestamp: NaiveDateTime,
    pub content: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Consult-section row as exported from system B. `text` may carry RTF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemBRow {
    #[serde(deserialize_with = "string_or_number")]
    pub encounter_id: String,
    pub section_id: String,
    /// Section description as shown in the EHR; used for exclusion markers.
    #[serde(default)]
    pub section_name: Option<String>,
    pub text: Option<String>,
    pub date: NaiveDateTime,
    #[serde(default)]
    pub specialism: Option<String>,
}

/// Raw rows for one or more admissions, tagged by source system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source_system", content = "rows")]
pub enum SourceRows {
    #[serde(rename = "metavision")]
    SystemA(Vec<SystemARow>),
    #[serde(rename = "hix")]
    SystemB(Vec<SystemBRow>),
}

impl SourceRows {
    pub fn empty(source_system: SourceSystem) -> Self {
        match source_system {
            SourceSystem::SystemA => Self::SystemA(Vec::new()),
            SourceSystem::SystemB => Self::SystemB(Vec::new()),
        }
    }

    pub fn source_system(&self) -> SourceSystem {
        match self {
            Self::SystemA(_) => SourceSystem::SystemA,
            Self::SystemB(_) => SourceSystem::SystemB,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::SystemA(rows) => rows.len(),
            Self::SystemB(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split a mixed export into one row set per encounter id.
    pub fn group_by_admission(self) -> BTreeMap<String, SourceRows> {
        let mut groups: BTreeMap<String, SourceRows> = BTreeMap::new();
        match self {
            Self::SystemA(rows) => {
                for row in rows {
                    if let Self::SystemA(bucket) = groups
                        .entry(row.encounter_id.clone())
                        .or_insert_with(|| Self::SystemA(Vec::new()))
                    {
                        bucket.push(row);
                    }
                }
            }
            Self::SystemB(rows) => {
                for row in rows {
                    if let Self::SystemB(bucket) = groups
                        .entry(row.encounter_id.clone())
                        .or_insert_with(|| Self::SystemB(Vec::new()))
                    {
                        bucket.push(row);
                    }
                }
            }
        }
        groups
    }
}

/// Warehouse exports carry encounter ids as integers or strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
