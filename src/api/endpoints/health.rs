//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub deployment: String,
    pub departments: Vec<String>,
}

/// `GET /health`: liveness plus the active environment.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        environment: ctx.config.environment.to_string(),
        deployment: ctx.config.llm.deployment.clone(),
        departments: ctx.config.departments.codes().into_iter().map(str::to_string).collect(),
    })
}
