//! Department prompt templates and the system B section lookup table.
//!
//! Loaded once at startup from JSON (built-in defaults or
//! `DISCHARGE_DEPARTMENTS_FILE`) and read-only afterwards. The category
//! list embedded in each system prompt is generated from the same list the
//! letter validator checks against, so the two cannot drift apart.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::config::ConfigError;

const DEFAULT_DEPARTMENTS: &str = include_str!("../resources/config/departments.json");

// ═══════════════════════════════════════════════════════════
// File format
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct DepartmentsFile {
    other_category: String,
    #[serde(default)]
    excluded_markers: Vec<String>,
    departments: Vec<DepartmentSpec>,
    #[serde(default)]
    section_categories: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DepartmentSpec {
    code: String,
    display_name: String,
    #[serde(default)]
    aliases: Vec<String>,
    instructions: String,
    categories: Vec<CategorySpec>,
    /// Department-specific section lookup, consulted before the shared one.
    #[serde(default)]
    section_categories: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CategorySpec {
    name: String,
    #[serde(default)]
    description: String,
}

// ═══════════════════════════════════════════════════════════
// Templates
// ═══════════════════════════════════════════════════════════

/// Per-department system prompt and ordered category list.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    code: String,
    display_name: String,
    categories: Vec<String>,
    system_prompt: String,
    sections: HashMap<String, String>,
}

impl PromptTemplate {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Categories in letter order. Also the exact key set of a valid letter.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn position(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.position(category).is_some()
    }

    fn from_spec(spec: DepartmentSpec) -> Result<Self, ConfigError> {
        let code = spec.code.trim().to_string();
        if code.is_empty() {
            return Err(ConfigError::InvalidDepartment {
                code: spec.code,
                reason: "department code is empty".into(),
            });
        }
        if spec.categories.is_empty() {
            return Err(ConfigError::InvalidDepartment {
                code,
                reason: "no categories".into(),
            });
        }

        let mut seen = HashSet::new();
        for category in &spec.categories {
            let name = category.name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidDepartment {
                    code,
                    reason: "empty category name".into(),
                });
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::InvalidDepartment {
                    code,
                    reason: format!("duplicate category '{name}'"),
                });
            }
        }

        let mut sections = HashMap::new();
        for (section_id, category) in &spec.section_categories {
            let category = category.trim();
            if !seen.contains(category) {
                return Err(ConfigError::InvalidDepartment {
                    code,
                    reason: format!("section '{section_id}' maps to unknown category '{category}'"),
                });
            }
            sections.insert(section_id.trim().to_string(), category.to_string());
        }

        let system_prompt = render_system_prompt(&spec.instructions, &spec.categories);
        Ok(Self {
            code,
            display_name: spec.display_name,
            categories: spec.categories.iter().map(|c| c.name.trim().to_string()).collect(),
            system_prompt,
            sections,
        })
    }
}

fn render_system_prompt(instructions: &str, categories: &[CategorySpec]) -> String {
    let mut prompt = String::new();
    prompt.push_str(instructions.trim());
    prompt.push_str("\n\nVerdeel de samenvatting over de volgende categorieën:\n");
    for category in categories {
        let name = category.name.trim();
        if category.description.trim().is_empty() {
            prompt.push_str(&format!("- {name}\n"));
        } else {
            prompt.push_str(&format!("- {name}: {}\n", category.description.trim()));
        }
    }

    let keys: Vec<String> = categories
        .iter()
        .map(|c| format!("\"{}\"", c.name.trim()))
        .collect();
    prompt.push_str(&format!(
        "\nAntwoord uitsluitend met één JSON-object met precies deze sleutels: {}. \
         Elke waarde is een string met doorlopende tekst. \
         Gebruik een lege string als het dossier over een categorie niets vermeldt.",
        keys.join(", ")
    ));
    prompt
}

// ═══════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct DepartmentRegistry {
    templates: HashMap<String, PromptTemplate>,
    aliases: HashMap<String, String>,
    section_categories: HashMap<String, String>,
    other_category: String,
    excluded_markers: Vec<String>,
}

impl DepartmentRegistry {
    /// Built-in NICU, IC, CAR and PICU templates.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(DEFAULT_DEPARTMENTS)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let file: DepartmentsFile = serde_json::from_str(raw)?;

        let other_category = file.other_category.trim().to_string();
        if other_category.is_empty() {
            return Err(ConfigError::Invalid {
                key: "other_category".into(),
                reason: "must not be empty".into(),
            });
        }

        let mut templates = HashMap::new();
        let mut aliases = HashMap::new();
        for spec in file.departments {
            let spec_aliases = spec.aliases.clone();
            let template = PromptTemplate::from_spec(spec)?;
            for alias in spec_aliases {
                aliases.insert(alias.trim().to_string(), template.code.clone());
            }
            if templates.contains_key(&template.code) {
                return Err(ConfigError::InvalidDepartment {
                    code: template.code,
                    reason: "defined twice".into(),
                });
            }
            templates.insert(template.code.clone(), template);
        }
        if templates.is_empty() {
            return Err(ConfigError::Invalid {
                key: "departments".into(),
                reason: "at least one department is required".into(),
            });
        }

        let excluded_markers = file
            .excluded_markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        Ok(Self {
            templates,
            aliases,
            section_categories: file.section_categories,
            other_category,
            excluded_markers,
        })
    }

    /// Resolve a department code or alias to its template.
    pub fn resolve(&self, department: &str) -> Result<&PromptTemplate, ConfigError> {
        let key = department.trim();
        if let Some(template) = self.templates.get(key) {
            return Ok(template);
        }
        self.aliases
            .get(key)
            .and_then(|code| self.templates.get(code))
            .ok_or_else(|| ConfigError::UnknownDepartment(key.to_string()))
    }

    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Map a system B section id to one of `template`'s categories. The
    /// department's own table wins over the shared one; a label the
    /// department does not use falls back to the "Other" label.
    pub fn category_for_section<'a>(&'a self, template: &'a PromptTemplate, section_id: &str) -> &'a str {
        let key = section_id.trim();
        template
            .sections
            .get(key)
            .or_else(|| self.section_categories.get(key))
            .map(String::as_str)
            .filter(|category| template.contains(category))
            .unwrap_or(&self.other_category)
    }

    pub fn other_category(&self) -> &str {
        &self.other_category
    }

    pub fn excluded_markers(&self) -> &[String] {
        &self.excluded_markers
    }
}
