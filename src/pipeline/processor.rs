//! Admission processing orchestrator.
//!
//! Drives one admission through the whole pipeline:
//! resolve department → normalize → redact → prompt → generate → store.
//!
//! Every collaborator sits behind a trait (`Redactor`, `LlmClient`,
//! `TokenCounter`, `LetterStore`) so the orchestrator is testable with
//! in-memory implementations.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::llm::{GenerationSettings, LetterGenerator, LlmClient, ValidationPolicy};
use super::normalize::PatientFileNormalizer;
use super::prompt::PromptBuilder;
use super::redaction::{RedactionAdapter, Redactor};
use super::store::{LetterStore, SaveOutcome};
use super::tokens::default_counter;
use crate::config::AppConfig;
use crate::models::enums::{AttemptStatus, LetterOutcome};
use crate::models::{Admission, GeneratedLetter, SourceRows};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One admission together with the source rows of its stay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionJob {
    pub admission: Admission,
    pub rows: SourceRows,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct AdmissionProcessor {
    config: Arc<AppConfig>,
    normalizer: PatientFileNormalizer,
    redaction: RedactionAdapter,
    prompt_builder: PromptBuilder,
    generator: LetterGenerator,
    store: Arc<dyn LetterStore>,
}

impl AdmissionProcessor {
    pub fn new(
        config: Arc<AppConfig>,
        redactor: Arc<dyn Redactor>,
        client: Arc<dyn LlmClient>,
        store: Arc<dyn LetterStore>,
    ) -> Self {
        let prompt_builder = PromptBuilder::for_deployment(
            default_counter(),
            &config.llm.deployment,
            config.llm.max_prompt_tokens,
        );
        let generator = LetterGenerator::new(
            client,
            GenerationSettings {
                temperature: config.llm.temperature,
                policy: ValidationPolicy {
                    max_placeholder_fraction: config.pipeline.max_placeholder_fraction,
                },
            },
        );
        Self {
            normalizer: PatientFileNormalizer::new(config.pipeline.min_stay_hours),
            redaction: RedactionAdapter::new(redactor),
            prompt_builder,
            generator,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LetterStore> {
        &self.store
    }

    /// Process one admission. `Ok` only when a successful letter was
    /// stored; every other outcome is an error whose attempt status is
    /// recorded on the admission. Letters with a model, validation or
    /// length outcome are persisted as well so the failure is visible in
    /// the history.
    pub fn process(&self, job: &AdmissionJob) -> Result<GeneratedLetter, PipelineError> {
        let admission_id = job.admission.admission_id.as_str();
        let span = tracing::info_span!("process_admission", admission_id, department = %job.admission.department);
        let _guard = span.enter();

        let result = self.run(job);
        let status = match &result {
            Ok(_) => AttemptStatus::Success,
            Err(e) => e.attempt_status(),
        };

        if let Err(e) = self.store.record_attempt(&job.admission, status, Utc::now()) {
            tracing::error!(error = %e, "Failed to record admission attempt");
            if result.is_ok() {
                return Err(PipelineError::Storage(e));
            }
        }

        match &result {
            Ok(letter) => tracing::info!(letter_id = %letter.id, "Admission processed"),
            Err(e) => tracing::warn!(status = %status, retryable = e.is_retryable(), error = %e, "Admission not processed"),
        }
        result
    }

    fn run(&self, job: &AdmissionJob) -> Result<GeneratedLetter, PipelineError> {
        let admission = &job.admission;
        let environment = self.config.environment;

        let template = self
            .config
            .departments
            .resolve(&admission.department)
            .map_err(|_| PipelineError::UnknownDepartment(admission.department.clone()))?;

        let entries = self
            .normalizer
            .normalize(admission, &job.rows, template, &self.config.departments)?;

        let redacted = self.redaction.redact_entries(&entries, &admission.admission_id)?;
        if redacted.is_empty() {
            return Err(super::normalize::EmptyPatientFile {
                admission_id: admission.admission_id.clone(),
            }
            .into());
        }

        let prompt = match self.prompt_builder.build(&redacted, template) {
            Ok(prompt) => prompt,
            Err(e) => {
                let letter = LetterGenerator::length_rejected(&admission.admission_id, template, environment, &e);
                self.save(&letter)?;
                return Err(e.into());
            }
        };

        let letter = self
            .generator
            .generate(&admission.admission_id, &prompt, template, environment);
        self.save(&letter)?;

        let detail = letter.error_detail.clone().unwrap_or_default();
        match letter.outcome {
            LetterOutcome::Success => Ok(letter),
            LetterOutcome::ValidationError => Err(PipelineError::Validation(detail)),
            LetterOutcome::ModelError | LetterOutcome::LengthError => Err(PipelineError::Model(detail)),
        }
    }

    fn save(&self, letter: &GeneratedLetter) -> Result<SaveOutcome, PipelineError> {
        let outcome = self.store.save(letter)?;
        tracing::debug!(letter_id = %letter.id, outcome = ?outcome, "Letter stored");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::models::enums::SourceSystem;
    use crate::models::SystemARow;
    use crate::pipeline::llm::{LlmError, MockLlmClient};
    use crate::pipeline::redaction::{PatternRedactor, RedactionError};
    use crate::pipeline::store::SqliteLetterStore;
    use chrono::{NaiveDate, NaiveDateTime};

    struct BrokenRedactor;

    impl Redactor for BrokenRedactor {
        fn deidentify(&self, _text: &str) -> Result<String, RedactionError> {
            Err(RedactionError::Failed("service unavailable".into()))
        }
    }

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn row(category: &str, at: NaiveDateTime, content: &str) -> SystemARow {
        SystemARow {
            encounter_id: "1001".into(),
            category: Some(category.into()),
            timestamp: at,
            content: Some(content.into()),
            department: Some("NICU".into()),
        }
    }

    fn job(department: &str, rows: Vec<SystemARow>) -> AdmissionJob {
        AdmissionJob {
            admission: Admission {
                admission_id: "1001".into(),
                patient_id: "p-1001".into(),
                department: department.into(),
                admitted_at: ts(18, 10),
                discharged_at: Some(ts(21, 12)),
                source_system: SourceSystem::SystemA,
            },
            rows: SourceRows::SystemA(rows),
        }
    }

    fn scenario_rows() -> Vec<SystemARow> {
        vec![
            row("Respiratie", ts(20, 8), "CPAP afgebouwd"),
            row("Infectie", ts(19, 9), "Bloedkweek negatief"),
        ]
    }

    /// A response with every NICU key filled in.
    fn nicu_response() -> String {
        let config = test_config();
        let template = config.departments.resolve("NICU").unwrap();
        let map: serde_json::Map<String, serde_json::Value> = template
            .categories()
            .iter()
            .map(|c| (c.clone(), serde_json::Value::String(format!("Samenvatting {c}"))))
            .collect();
        serde_json::Value::Object(map).to_string()
    }

    fn processor_with(
        config: AppConfig,
        redactor: Arc<dyn Redactor>,
        client: Arc<MockLlmClient>,
    ) -> (AdmissionProcessor, Arc<SqliteLetterStore>) {
        let store = Arc::new(SqliteLetterStore::open_in_memory().unwrap());
        let processor = AdmissionProcessor::new(Arc::new(config), redactor, client, store.clone());
        (processor, store)
    }

    fn processor(client: Arc<MockLlmClient>) -> (AdmissionProcessor, Arc<SqliteLetterStore>) {
        processor_with(test_config(), Arc::new(PatternRedactor::default()), client)
    }

    #[test]
    fn successful_admission_stores_current_letter() {
        let client = Arc::new(MockLlmClient::new(&nicu_response()));
        let (processor, store) = processor(client.clone());

        let letter = processor.process(&job("NICU", scenario_rows())).unwrap();
        assert!(letter.is_success());
        assert_eq!(letter.sections.len(), 11);
        assert_eq!(letter.section("Respiratie"), Some("Samenvatting Respiratie"));

        let stored = store.get_latest("1001").unwrap().unwrap();
        assert_eq!(stored.id, letter.id);
        assert!(stored.is_current);

        let record = store.find_admission("1001").unwrap().unwrap();
        assert_eq!(record.last_attempt_status, Some(AttemptStatus::Success));

        // Chronological file: the Infectie note of the 19th precedes the 20th
        let prompts = client.user_prompts();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.find("19-04-2024").unwrap() < prompt.find("20-04-2024").unwrap());
        assert!(prompt.find("Bloedkweek negatief").unwrap() < prompt.find("CPAP afgebouwd").unwrap());
    }

    #[test]
    fn identifiers_never_reach_the_model() {
        let client = Arc::new(MockLlmClient::new(&nicu_response()));
        let (processor, _store) = processor(client.clone());

        let rows = vec![row("Respiratie", ts(20, 8), "Moeder bereikbaar op 06-12345678, BSN 123456782")];
        processor.process(&job("NICU", rows)).unwrap();

        let prompt = &client.user_prompts()[0];
        assert!(!prompt.contains("06-12345678"));
        assert!(!prompt.contains("123456782"));
    }

    #[test]
    fn empty_patient_file_skips_the_model() {
        let client = Arc::new(MockLlmClient::new(&nicu_response()));
        let (processor, store) = processor(client.clone());

        let rows = vec![row("Respiratie", ts(20, 8), "   ")];
        let err = processor.process(&job("NICU", rows)).unwrap_err();

        assert!(matches!(err, PipelineError::EmptyPatientFile(_)));
        assert_eq!(client.calls(), 0);
        assert!(store.history("1001").unwrap().is_empty());
        let record = store.find_admission("1001").unwrap().unwrap();
        assert_eq!(record.last_attempt_status, Some(AttemptStatus::EmptyPatientFile));
    }

    #[test]
    fn redaction_failure_skips_the_model() {
        let client = Arc::new(MockLlmClient::new(&nicu_response()));
        let (processor, store) = processor_with(test_config(), Arc::new(BrokenRedactor), client.clone());

        let err = processor.process(&job("NICU", scenario_rows())).unwrap_err();

        assert!(matches!(err, PipelineError::Redaction(_)));
        assert!(!err.is_retryable());
        assert_eq!(client.calls(), 0);
        assert!(store.history("1001").unwrap().is_empty());
        let record = store.find_admission("1001").unwrap().unwrap();
        assert_eq!(record.last_attempt_status, Some(AttemptStatus::RedactionError));
    }

    #[test]
    fn oversized_prompt_is_stored_as_length_error() {
        let client = Arc::new(MockLlmClient::new(&nicu_response()));
        let mut config = test_config();
        config.llm.max_prompt_tokens = Some(50);
        let (processor, store) = processor_with(config, Arc::new(PatternRedactor::default()), client.clone());

        let err = processor.process(&job("NICU", scenario_rows())).unwrap_err();

        assert!(matches!(err, PipelineError::Length(_)));
        assert_eq!(client.calls(), 0);
        let stored = store.get_latest("1001").unwrap().unwrap();
        assert_eq!(stored.outcome, LetterOutcome::LengthError);
        assert!(stored.input_tokens.unwrap() > 50);
    }

    #[test]
    fn model_failure_is_stored_and_retryable() {
        let client = Arc::new(MockLlmClient::failing(LlmError::Timeout(120)));
        let (processor, store) = processor(client);

        let err = processor.process(&job("NICU", scenario_rows())).unwrap_err();

        assert!(matches!(err, PipelineError::Model(_)));
        assert!(err.is_retryable());
        let stored = store.get_latest("1001").unwrap().unwrap();
        assert_eq!(stored.outcome, LetterOutcome::ModelError);
        assert!(stored.sections.is_empty());
    }

    #[test]
    fn invalid_response_is_a_validation_error() {
        let client = Arc::new(MockLlmClient::new(r#"{"Respiratie": "alleen dit"}"#));
        let (processor, store) = processor(client);

        let err = processor.process(&job("NICU", scenario_rows())).unwrap_err();

        assert!(matches!(err, PipelineError::Validation(_)));
        let stored = store.get_latest("1001").unwrap().unwrap();
        assert_eq!(stored.outcome, LetterOutcome::ValidationError);
        assert_eq!(stored.raw_response.as_deref(), Some(r#"{"Respiratie": "alleen dit"}"#));
    }

    #[test]
    fn unknown_department_is_recorded() {
        let client = Arc::new(MockLlmClient::new(&nicu_response()));
        let (processor, store) = processor(client.clone());

        let err = processor.process(&job("Dermatologie", scenario_rows())).unwrap_err();

        assert!(matches!(err, PipelineError::UnknownDepartment(ref d) if d == "Dermatologie"));
        assert_eq!(client.calls(), 0);
        let record = store.find_admission("1001").unwrap().unwrap();
        assert_eq!(record.last_attempt_status, Some(AttemptStatus::UnknownDepartment));
    }

    #[test]
    fn regeneration_keeps_history() {
        let client = Arc::new(MockLlmClient::new(&nicu_response()));
        let (processor, store) = processor(client);

        let first = processor.process(&job("NICU", scenario_rows())).unwrap();
        let second = processor.process(&job("NICU", scenario_rows())).unwrap();

        let history = store.history("1001").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(store.get_latest("1001").unwrap().unwrap().id, second.id);
        assert!(history.iter().any(|l| l.id == first.id && !l.is_current));
    }
}
