//! Feedback endpoints:
//! - `POST /api/feedback`: store one answer
//! - `GET /api/feedback/:admission_id`: answers for an admission

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::Feedback;

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub admission_id: String,
    #[serde(default)]
    pub letter_id: Option<Uuid>,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub rating: Option<i32>,
}

pub async fn submit(
    State(ctx): State<ApiContext>,
    Json(request): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<Feedback>), ApiError> {
    if request.admission_id.trim().is_empty() || request.question.trim().is_empty() {
        return Err(ApiError::BadRequest("admission_id and question are required".into()));
    }

    let feedback = Feedback {
        id: Uuid::new_v4(),
        admission_id: request.admission_id,
        letter_id: request.letter_id,
        question: request.question,
        answer: request.answer,
        rating: request.rating,
        created_at: Utc::now(),
    };
    ctx.store.add_feedback(&feedback)?;
    tracing::info!(feedback_id = %feedback.id, admission_id = %feedback.admission_id, "Feedback stored");
    Ok((StatusCode::CREATED, Json(feedback)))
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Path(admission_id): Path<String>,
) -> Result<Json<Vec<Feedback>>, ApiError> {
    Ok(Json(ctx.store.feedback_for(&admission_id)?))
}
