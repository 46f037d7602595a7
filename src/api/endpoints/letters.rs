//! Letter endpoints:
//! - `GET /api/letters/:admission_id`: latest successful letter
//! - `GET /api/letters/:admission_id/history`: all letters, newest first
//! - `DELETE /api/letters?older_than_days=N`: purge
//! - `DELETE /api/letters/environment/:environment`: wipe one environment

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::enums::Environment;
use crate::models::GeneratedLetter;
use crate::pipeline::LetterStore;
use crate::retrieval::{build_response, RetrievalInput};

#[derive(Debug, Default, Deserialize)]
pub struct LetterQuery {
    /// `json` for the structured view; plain text otherwise.
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    pub older_than_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

pub async fn latest(
    State(ctx): State<ApiContext>,
    Path(admission_id): Path<String>,
    Query(query): Query<LetterQuery>,
) -> Result<Response, ApiError> {
    let record = ctx.store.find_admission(&admission_id)?;
    let latest = ctx.store.get_latest(&admission_id)?;
    let latest_successful = ctx.store.latest_successful(&admission_id)?;

    let response = build_response(
        &RetrievalInput {
            admission_id: &admission_id,
            patient_id: record.as_ref().map(|r| r.admission.patient_id.as_str()),
            latest: latest.as_ref(),
            latest_successful: latest_successful.as_ref(),
        },
        Utc::now(),
        &Local,
    );

    let status = if response.is_available() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    let as_json = query.format.as_deref().is_some_and(|f| f.eq_ignore_ascii_case("json"));
    Ok(if as_json {
        (status, Json(response)).into_response()
    } else {
        (status, response.message).into_response()
    })
}

pub async fn history(
    State(ctx): State<ApiContext>,
    Path(admission_id): Path<String>,
) -> Result<Json<Vec<GeneratedLetter>>, ApiError> {
    let letters = ctx
        .store
        .history(&admission_id)?
        .into_iter()
        .map(|mut letter| {
            // Raw model output stays in the database for audit only
            letter.raw_response = None;
            letter
        })
        .collect();
    Ok(Json(letters))
}

pub async fn purge(
    State(ctx): State<ApiContext>,
    Query(query): Query<PurgeQuery>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let days = query
        .older_than_days
        .ok_or_else(|| ApiError::BadRequest("older_than_days is required".into()))?;
    if days < 1 {
        return Err(ApiError::BadRequest("older_than_days must be at least 1".into()));
    }
    let window = Duration::try_days(days)
        .ok_or_else(|| ApiError::BadRequest("older_than_days is out of range".into()))?;
    let deleted = ctx.store.purge_older_than(window)?;
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn delete_environment(
    State(ctx): State<ApiContext>,
    Path(environment): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let environment = Environment::from_str(&environment.to_lowercase())
        .map_err(|_| ApiError::BadRequest(format!("Unknown environment: {environment}")))?;
    let deleted = ctx.store.delete_environment(environment)?;
    Ok(Json(DeletedResponse { deleted }))
}
