//! `POST /api/admissions/generate`: run the pipeline for a set of
//! admissions and report the outcome of each.

use axum::extract::State;
use axum::Json;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{Admission, SourceRows};
use crate::pipeline::redaction::pseudonymize_patient_id;
use crate::pipeline::{run_batch, AdmissionJob, BatchReport};

#[derive(Debug, Deserialize)]
pub struct AdmissionInput {
    pub admission_id: String,
    /// Hospital patient number; pseudonymized before anything is stored.
    pub patient_number: String,
    pub department: String,
    pub admitted_at: NaiveDateTime,
    #[serde(default)]
    pub discharged_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub admissions: Vec<AdmissionInput>,
    /// Rows of all listed admissions from one source system.
    pub source: SourceRows,
}

pub async fn generate(
    State(ctx): State<ApiContext>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<BatchReport>, ApiError> {
    if request.admissions.is_empty() {
        return Err(ApiError::BadRequest("admissions must not be empty".into()));
    }

    let source_system = request.source.source_system();
    let mut grouped = request.source.group_by_admission();
    let salt = &ctx.config.pipeline.pseudonym_salt;

    let mut jobs = Vec::with_capacity(request.admissions.len());
    for input in request.admissions {
        if input.admission_id.trim().is_empty() {
            return Err(ApiError::BadRequest("admission_id must not be empty".into()));
        }
        let mut admission = Admission::new(
            input.admission_id,
            pseudonymize_patient_id(&input.patient_number, salt),
            input.department,
            input.admitted_at,
            source_system,
        );
        if let Some(end) = input.discharged_at {
            admission
                .finish(end)
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        }
        let rows = grouped
            .remove(&admission.admission_id)
            .unwrap_or_else(|| SourceRows::empty(source_system));
        jobs.push(AdmissionJob { admission, rows });
    }

    if !grouped.is_empty() {
        tracing::warn!(unmatched_admissions = grouped.len(), "Rows for unlisted admissions ignored");
    }

    tracing::info!(admissions = jobs.len(), source_system = %source_system, "Generation requested");
    let report = run_batch(ctx.processor.clone(), jobs, ctx.config.pipeline.max_concurrency).await;
    Ok(Json(report))
}
