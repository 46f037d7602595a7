//! Prompt assembly: department system prompt plus the patient file rendered
//! by date and category, checked against the token ceiling.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use super::tokens::{context_length_for_deployment, TokenCounter};
use crate::departments::PromptTemplate;
use crate::models::PatientFileEntry;

/// Ceiling used when neither an override nor the deployment's context
/// length is known. Matches the smallest deployment in use.
pub const FALLBACK_MAX_PROMPT_TOKENS: usize = 16_384;

const USER_INSTRUCTION: &str = "Hieronder staat het patiëntendossier van deze opname, \
gesorteerd op datum en categorie. Schrijf per categorie een samenvatting voor de ontslagbrief \
en antwoord in het gevraagde JSON-formaat.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Prompt of {tokens} tokens exceeds the limit of {limit}")]
pub struct LengthError {
    pub tokens: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub system_prompt: String,
    pub user_prompt: String,
    pub token_count: usize,
}

pub struct PromptBuilder {
    counter: Arc<dyn TokenCounter>,
    max_tokens: usize,
}

impl PromptBuilder {
    pub fn new(counter: Arc<dyn TokenCounter>, max_tokens: usize) -> Self {
        Self { counter, max_tokens }
    }

    /// Ceiling from the explicit override, else the deployment's known
    /// context length, else [`FALLBACK_MAX_PROMPT_TOKENS`].
    pub fn for_deployment(
        counter: Arc<dyn TokenCounter>,
        deployment: &str,
        max_prompt_tokens: Option<usize>,
    ) -> Self {
        let max_tokens = max_prompt_tokens
            .or_else(|| context_length_for_deployment(deployment))
            .unwrap_or(FALLBACK_MAX_PROMPT_TOKENS);
        Self::new(counter, max_tokens)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn build(&self, entries: &[PatientFileEntry], template: &PromptTemplate) -> Result<Prompt, LengthError> {
        let system_prompt = template.system_prompt().to_string();
        let user_prompt = format!("{USER_INSTRUCTION}\n\n{}", render_patient_file(entries, template));
        let token_count = self.counter.count(&system_prompt) + self.counter.count(&user_prompt);

        if token_count > self.max_tokens {
            return Err(LengthError {
                tokens: token_count,
                limit: self.max_tokens,
            });
        }

        Ok(Prompt {
            system_prompt,
            user_prompt,
            token_count,
        })
    }
}

/// Render entries grouped by date (ascending, `dd-mm-YYYY`), then by
/// category in department order with unknown categories last in
/// alphabetical order. Each entry is prefixed with its `HH:MM` time.
pub fn render_patient_file(entries: &[PatientFileEntry], template: &PromptTemplate) -> String {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<(usize, &str), Vec<&PatientFileEntry>>> = BTreeMap::new();
    for entry in entries {
        let rank = template.position(entry.category()).unwrap_or(usize::MAX);
        by_date
            .entry(entry.authored_at().date())
            .or_default()
            .entry((rank, entry.category()))
            .or_default()
            .push(entry);
    }

    let mut out = String::new();
    for (date, categories) in by_date {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&date.format("%d-%m-%Y").to_string());
        out.push('\n');
        for ((_, category), mut items) in categories {
            items.sort_by_key(|e| e.authored_at());
            out.push_str(category);
            out.push('\n');
            for item in items {
                out.push_str(&format!(
                    "{} {}\n",
                    item.authored_at().format("%H:%M"),
                    item.content().trim()
                ));
            }
        }
    }
    out
}
