//! Concurrent processing of many admissions.
//!
//! Each admission runs on the blocking pool (the model client and the
//! store are synchronous). A semaphore bounds how many run at once; one
//! failing admission never stops the others.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::processor::{AdmissionJob, AdmissionProcessor};
use crate::models::enums::AttemptStatus;

/// Outcome of one admission within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionReport {
    pub admission_id: String,
    pub status: AttemptStatus,
    pub letter_id: Option<Uuid>,
    pub message: Option<String>,
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub admissions: Vec<AdmissionReport>,
}

impl BatchReport {
    fn push(&mut self, report: AdmissionReport) {
        self.total += 1;
        if report.status == AttemptStatus::Success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.admissions.push(report);
    }
}

/// Process all jobs with at most `max_concurrency` in flight. Reports are
/// returned in input order.
pub async fn run_batch(
    processor: Arc<AdmissionProcessor>,
    jobs: Vec<AdmissionJob>,
    max_concurrency: usize,
) -> BatchReport {
    let started = Instant::now();
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut set = JoinSet::new();

    for (index, job) in jobs.into_iter().enumerate() {
        let processor = processor.clone();
        let permits = permits.clone();
        set.spawn(async move {
            let admission_id = job.admission.admission_id.clone();
            let Ok(_permit) = permits.acquire_owned().await else {
                return (index, internal_report(admission_id, "batch cancelled".into()));
            };
            let outcome = tokio::task::spawn_blocking(move || processor.process(&job)).await;
            let report = match outcome {
                Ok(Ok(letter)) => AdmissionReport {
                    admission_id,
                    status: AttemptStatus::Success,
                    letter_id: Some(letter.id),
                    message: None,
                    retryable: false,
                },
                Ok(Err(e)) => AdmissionReport {
                    admission_id,
                    status: e.attempt_status(),
                    letter_id: None,
                    message: Some(e.to_string()),
                    retryable: e.is_retryable(),
                },
                Err(join_error) => {
                    tracing::error!(admission_id = %admission_id, error = %join_error, "Admission task aborted");
                    internal_report(admission_id, join_error.to_string())
                }
            };
            (index, report)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!(error = %e, "Batch task aborted"),
        }
    }
    results.sort_by_key(|(index, _)| *index);

    let mut report = BatchReport::default();
    for (_, admission) in results {
        report.push(admission);
    }

    tracing::info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Batch finished"
    );
    report
}

fn internal_report(admission_id: String, message: String) -> AdmissionReport {
    AdmissionReport {
        admission_id,
        status: AttemptStatus::Internal,
        letter_id: None,
        message: Some(message),
        retryable: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::models::enums::SourceSystem;
    use crate::models::{Admission, SourceRows, SystemARow};
    use crate::pipeline::llm::{LlmError, MockLlmClient};
    use crate::pipeline::redaction::PatternRedactor;
    use crate::pipeline::store::{LetterStore, SqliteLetterStore};
    use chrono::NaiveDate;

    fn job(admission_id: &str, content: &str) -> AdmissionJob {
        let at = NaiveDate::from_ymd_opt(2024, 4, 20)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        AdmissionJob {
            admission: Admission {
                admission_id: admission_id.into(),
                patient_id: format!("p-{admission_id}"),
                department: "CAR".into(),
                admitted_at: at - chrono::Duration::days(3),
                discharged_at: Some(at),
                source_system: SourceSystem::SystemA,
            },
            rows: SourceRows::SystemA(vec![SystemARow {
                encounter_id: admission_id.into(),
                category: Some("Beloop".into()),
                timestamp: at,
                content: Some(content.into()),
                department: Some("CAR".into()),
            }]),
        }
    }

    const CAR_RESPONSE: &str = r#"{"Anamnese": "a", "Aanvullend onderzoek": "b", "Beloop": "c",
        "Medicatie": "d", "Overig": "e", "Conclusie": "f"}"#;

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let store = Arc::new(SqliteLetterStore::open_in_memory().unwrap());
        let client = Arc::new(MockLlmClient::new(CAR_RESPONSE));
        let processor = Arc::new(AdmissionProcessor::new(
            Arc::new(test_config()),
            Arc::new(PatternRedactor::default()),
            client,
            store.clone(),
        ));

        let jobs = vec![job("1", "Stabiel beloop"), job("2", "   "), job("3", "Ontslagen naar huis")];
        let report = run_batch(processor, jobs, 2).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let ids: Vec<_> = report.admissions.iter().map(|a| a.admission_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(report.admissions[1].status, AttemptStatus::EmptyPatientFile);
        assert!(report.admissions[1].letter_id.is_none());
        assert!(store.get_latest("1").unwrap().unwrap().is_success());
        assert!(store.get_latest("3").unwrap().unwrap().is_success());
    }

    #[tokio::test]
    async fn model_errors_are_reported_as_retryable() {
        let store = Arc::new(SqliteLetterStore::open_in_memory().unwrap());
        let client = Arc::new(MockLlmClient::failing(LlmError::Connection("down".into())));
        let processor = Arc::new(AdmissionProcessor::new(
            Arc::new(test_config()),
            Arc::new(PatternRedactor::default()),
            client,
            store,
        ));

        let report = run_batch(processor, vec![job("1", "Stabiel beloop")], 4).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.admissions[0].status, AttemptStatus::ModelError);
        assert!(report.admissions[0].retryable);
    }

    #[tokio::test]
    async fn empty_batch_is_an_empty_report() {
        let processor = Arc::new(AdmissionProcessor::new(
            Arc::new(test_config()),
            Arc::new(PatternRedactor::default()),
            Arc::new(MockLlmClient::new("{}")),
            Arc::new(SqliteLetterStore::open_in_memory().unwrap()),
        ));
        let report = run_batch(processor, Vec::new(), 1).await;
        assert_eq!(report.total, 0);
        assert!(report.admissions.is_empty());
    }
}
