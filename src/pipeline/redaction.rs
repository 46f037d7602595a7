//! De-identification of patient-file text before it reaches the model.
//!
//! The capability itself sits behind [`Redactor`]; [`RedactionAdapter`]
//! wraps it with output cleanup and a per-call audit event. The audit event
//! carries lengths and an opaque context id, never text.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::sanitize::clean_text;
use crate::models::PatientFileEntry;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedactionError {
    #[error("De-identification failed: {0}")]
    Failed(String),

    #[error("Invalid redaction term list: {0}")]
    InvalidTerms(String),
}

/// A de-identification capability. Must be deterministic for equal input.
pub trait Redactor: Send + Sync {
    fn deidentify(&self, text: &str) -> Result<String, RedactionError>;
}

// ═══════════════════════════════════════════════════════════
// Adapter
// ═══════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct RedactionAdapter {
    inner: Arc<dyn Redactor>,
}

impl RedactionAdapter {
    pub fn new(inner: Arc<dyn Redactor>) -> Self {
        Self { inner }
    }

    /// Redact one text and clean the result.
    pub fn redact(&self, text: &str, context_id: &str) -> Result<String, RedactionError> {
        let result = self.inner.deidentify(text);
        match &result {
            Ok(redacted) => tracing::info!(
                target: "audit",
                context_id,
                source_chars = text.chars().count(),
                redacted_chars = redacted.chars().count(),
                "redaction applied"
            ),
            Err(e) => tracing::warn!(
                target: "audit",
                context_id,
                source_chars = text.chars().count(),
                error = %e,
                "redaction failed"
            ),
        }
        result.map(|redacted| clean_text(&redacted))
    }

    /// Redact every entry of a patient file. The first failure aborts the
    /// whole file so nothing partially redacted is passed on. Entries left
    /// empty after cleanup are dropped.
    pub fn redact_entries(
        &self,
        entries: &[PatientFileEntry],
        admission_id: &str,
    ) -> Result<Vec<PatientFileEntry>, RedactionError> {
        let mut redacted = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let context_id = format!("{admission_id}#{index}");
            let text = self.redact(entry.content(), &context_id)?;
            if !text.is_empty() {
                redacted.push(entry.with_content(text));
            }
        }
        Ok(redacted)
    }
}

// ═══════════════════════════════════════════════════════════
// Pattern redactor
// ═══════════════════════════════════════════════════════════

struct Rule {
    label: &'static str,
    regex: Regex,
    /// Matches for which this returns true are left untouched.
    skip: fn(&str) -> bool,
}

fn never(_: &str) -> bool {
    false
}

/// Ward abbreviations that look like the letter half of a postcode.
fn is_ward_code(matched: &str) -> bool {
    let letters: String = matched.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    matches!(letters.as_str(), "IC" | "CC" | "MC" | "HC" | "OK" | "SEH")
}

// Order matters: e-mail and URL before numbers, phone numbers before the
// bare digit runs they contain.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule {
            label: "EMAIL",
            regex: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
            skip: never,
        },
        Rule {
            label: "URL",
            regex: Regex::new(r#"\b(?:https?://|www\.)[^\s<>"]+"#).unwrap(),
            skip: never,
        },
        Rule {
            label: "TELEFOONNUMMER",
            regex: Regex::new(r"(?:\+31[\s-]?|\b0)(?:6[\s-]?\d{8}|\d{2}[\s-]?\d{7}|\d{3}[\s-]?\d{6})\b")
                .unwrap(),
            skip: never,
        },
        Rule {
            label: "BSN",
            regex: Regex::new(r"\b\d{9}\b").unwrap(),
            skip: never,
        },
        Rule {
            label: "PATIENTNUMMER",
            regex: Regex::new(r"\b\d{7}\b").unwrap(),
            skip: never,
        },
        Rule {
            label: "POSTCODE",
            regex: Regex::new(r"\b[1-9]\d{3} ?[A-Z]{2}\b").unwrap(),
            skip: is_ward_code,
        },
        Rule {
            label: "LEEFTIJD",
            regex: Regex::new(r"\b(?P<value>\d{1,3})-jarige?\b").unwrap(),
            skip: never,
        },
        // Title kept, name replaced: "Dhr. Bakker", "mw. J. de Groot"
        Rule {
            label: "PERSOON",
            regex: Regex::new(&format!(
                r"\b(?i:(?:dhr|mw|mevr|dr|zr)(?:\.\s*|\s+)|(?:mevrouw|meneer)\s+)(?P<value>(?:\p{{Lu}}\.\s?)*{SURNAME})"
            ))
            .unwrap(),
            skip: never,
        },
        // Initials followed by a surname: "J. de Groot", "A.B. Visser"
        Rule {
            label: "PERSOON",
            regex: Regex::new(&format!(r"\b(?P<value>(?:\p{{Lu}}\.\s?)+{SURNAME})")).unwrap(),
            skip: never,
        },
    ]
});

/// Optional Dutch name particles, then a capitalised (possibly
/// double-barrelled) surname.
const SURNAME: &str = r"(?:(?i:van|de|der|den|ter|ten|te|het|in 't|'t)\s+)*\p{Lu}\p{Ll}+(?:-\p{Lu}\p{Ll}+)?";

/// Regex-based de-identification for Dutch clinical notes.
///
/// Replaces contact details, identifiers, ages and configured names and
/// locations with numbered placeholders such as `[PERSOON-1]`. Dates are
/// left intact.
#[derive(Default)]
pub struct PatternRedactor {
    names: Option<Regex>,
    locations: Option<Regex>,
}

impl PatternRedactor {
    pub fn new(names: &[String], locations: &[String]) -> Result<Self, RedactionError> {
        Ok(Self {
            names: term_regex(names)?,
            locations: term_regex(locations)?,
        })
    }
}

impl Redactor for PatternRedactor {
    fn deidentify(&self, text: &str) -> Result<String, RedactionError> {
        let mut numbering = Numbering::default();
        let mut out = text.to_string();
        for rule in RULES.iter() {
            out = replace_with_placeholders(&rule.regex, rule.label, rule.skip, &out, &mut numbering);
        }
        if let Some(names) = &self.names {
            out = replace_with_placeholders(names, "PERSOON", never, &out, &mut numbering);
        }
        if let Some(locations) = &self.locations {
            out = replace_with_placeholders(locations, "LOCATIE", never, &out, &mut numbering);
        }
        Ok(out)
    }
}

/// Case-insensitive whole-word alternation, longest term first.
fn term_regex(terms: &[String]) -> Result<Option<Regex>, RedactionError> {
    let mut terms: Vec<&str> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return Ok(None);
    }
    terms.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));
    terms.dedup();
    let alternation: Vec<String> = terms.iter().map(|t| regex::escape(t)).collect();
    let pattern = format!(r"(?i)\b(?:{})\b", alternation.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| RedactionError::InvalidTerms(e.to_string()))
}

/// Placeholder numbers per label, stable for equal values within one call.
#[derive(Default)]
struct Numbering {
    seen: HashMap<(&'static str, String), usize>,
    next: HashMap<&'static str, usize>,
}

impl Numbering {
    fn placeholder(&mut self, label: &'static str, value: &str) -> String {
        let key: String = value
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        let n = match self.seen.get(&(label, key.clone())) {
            Some(n) => *n,
            None => {
                let counter = self.next.entry(label).or_insert(0);
                *counter += 1;
                self.seen.insert((label, key), *counter);
                *counter
            }
        };
        format!("[{label}-{n}]")
    }
}

fn replace_with_placeholders(
    regex: &Regex,
    label: &'static str,
    skip: fn(&str) -> bool,
    text: &str,
    numbering: &mut Numbering,
) -> String {
    regex
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            if skip(whole) {
                return whole.to_string();
            }
            match (caps.get(0), caps.name("value")) {
                (Some(m), Some(v)) => {
                    let prefix = &whole[..v.start() - m.start()];
                    let suffix = &whole[v.end() - m.start()..];
                    format!("{prefix}{}{suffix}", numbering.placeholder(label, v.as_str()))
                }
                _ => numbering.placeholder(label, whole),
            }
        })
        .into_owned()
}

// ═══════════════════════════════════════════════════════════
// Pseudonymization
// ═══════════════════════════════════════════════════════════

/// Lowercase hex SHA-256 of the UTF-16LE encoding of `hospital_number + salt`.
pub fn pseudonymize_patient_id(hospital_number: &str, salt: &str) -> String {
    let bytes: Vec<u8> = hospital_number
        .encode_utf16()
        .chain(salt.encode_utf16())
        .flat_map(u16::to_le_bytes)
        .collect();
    Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
