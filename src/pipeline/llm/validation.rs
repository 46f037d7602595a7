//! Checks a raw model response against the department category set.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::models::LetterSection;

/// Values that carry no information. Compared trimmed and lowercased.
const PLACEHOLDER_VALUES: &[&str] = &[
    "",
    "-",
    "n.v.t.",
    "n.v.t",
    "nvt",
    "onbekend",
    "geen informatie",
    "geen gegevens",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Response is not a JSON object")]
    NotAnObject,

    #[error("Category set mismatch (missing: [{}], unexpected: [{}])", .missing.join(", "), .unexpected.join(", "))]
    KeyMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Value for category {0} is not a string")]
    NonStringValue(String),

    #[error("{placeholders} of {total} categories are empty or placeholders")]
    TooManyPlaceholders { placeholders: usize, total: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    /// Highest tolerated share of empty/placeholder values, 0.0..=1.0.
    pub max_placeholder_fraction: f32,
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline, or the
    // leading word of a single-line fence
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

pub fn is_placeholder(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    PLACEHOLDER_VALUES.contains(&normalized.as_str())
}

/// Parse and validate a model response. Keys must equal `categories`
/// exactly (case-sensitive, order-insensitive) and every value must be a
/// string. Sections are returned in `categories` order.
pub fn validate_letter(
    raw: &str,
    categories: &[String],
    policy: &ValidationPolicy,
) -> Result<Vec<LetterSection>, ValidationError> {
    let json: serde_json::Value =
        serde_json::from_str(strip_code_fences(raw)).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
    let object = json.as_object().ok_or(ValidationError::NotAnObject)?;

    let expected: BTreeSet<&str> = categories.iter().map(String::as_str).collect();
    let actual: BTreeSet<&str> = object.keys().map(String::as_str).collect();
    if expected != actual {
        return Err(ValidationError::KeyMismatch {
            missing: expected.difference(&actual).map(|s| s.to_string()).collect(),
            unexpected: actual.difference(&expected).map(|s| s.to_string()).collect(),
        });
    }

    let mut sections = Vec::with_capacity(categories.len());
    for category in categories {
        let text = object
            .get(category)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::NonStringValue(category.clone()))?;
        sections.push(LetterSection {
            category: category.clone(),
            text: text.trim().to_string(),
        });
    }

    let placeholders = sections.iter().filter(|s| is_placeholder(&s.text)).count();
    let total = sections.len();
    if total > 0 && placeholders as f32 / total as f32 > policy.max_placeholder_fraction {
        return Err(ValidationError::TooManyPlaceholders { placeholders, total });
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<String> {
        vec!["Respiratie".into(), "Infectie".into(), "Overig".into()]
    }

    fn policy(max: f32) -> ValidationPolicy {
        ValidationPolicy {
            max_placeholder_fraction: max,
        }
    }

    #[test]
    fn valid_response_in_category_order() {
        let raw = r#"{"Overig": "", "Infectie": "CRP daalde.", "Respiratie": "CPAP gestopt."}"#;
        let sections = validate_letter(raw, &categories(), &policy(0.9)).unwrap();
        let order: Vec<_> = sections.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(order, vec!["Respiratie", "Infectie", "Overig"]);
        assert_eq!(sections[1].text, "CRP daalde.");
    }

    #[test]
    fn code_fences_are_stripped() {
        let raw = "```json\n{\"Respiratie\": \"a\", \"Infectie\": \"b\", \"Overig\": \"c\"}\n```";
        assert!(validate_letter(raw, &categories(), &policy(0.9)).is_ok());
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
        assert_eq!(strip_code_fences("```json {\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```{}```"), "{}");
    }

    #[test]
    fn single_line_fence_with_info_string() {
        let raw = r#"```json {"Respiratie": "a", "Infectie": "b", "Overig": "c"}```"#;
        let sections = validate_letter(raw, &categories(), &policy(0.9)).unwrap();
        assert_eq!(sections[2].text, "c");
    }

    #[test]
    fn missing_key_is_mismatch() {
        let raw = r#"{"Respiratie": "a", "Infectie": "b"}"#;
        let err = validate_letter(raw, &categories(), &policy(0.9)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::KeyMismatch {
                missing: vec!["Overig".into()],
                unexpected: vec![],
            }
        );
    }

    #[test]
    fn key_case_matters() {
        let raw = r#"{"respiratie": "a", "Infectie": "b", "Overig": "c"}"#;
        let err = validate_letter(raw, &categories(), &policy(0.9)).unwrap_err();
        assert!(matches!(err, ValidationError::KeyMismatch { .. }));
    }

    #[test]
    fn non_string_value_is_rejected() {
        let raw = r#"{"Respiratie": ["a"], "Infectie": "b", "Overig": "c"}"#;
        let err = validate_letter(raw, &categories(), &policy(0.9)).unwrap_err();
        assert_eq!(err, ValidationError::NonStringValue("Respiratie".into()));
    }

    #[test]
    fn not_json_or_not_object() {
        assert!(matches!(
            validate_letter("Hier is de brief", &categories(), &policy(0.9)),
            Err(ValidationError::InvalidJson(_))
        ));
        assert_eq!(
            validate_letter("[1, 2]", &categories(), &policy(0.9)).unwrap_err(),
            ValidationError::NotAnObject
        );
    }

    #[test]
    fn placeholder_fraction_is_enforced() {
        let raw = r#"{"Respiratie": "n.v.t.", "Infectie": " - ", "Overig": "Ouders betrokken."}"#;
        assert!(validate_letter(raw, &categories(), &policy(0.9)).is_ok());
        let err = validate_letter(raw, &categories(), &policy(0.5)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooManyPlaceholders {
                placeholders: 2,
                total: 3
            }
        );
    }
}
