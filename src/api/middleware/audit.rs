//! Request logging middleware.
//!
//! Writes every request to the `request_log` table with method, path,
//! response status and runtime. Runs outermost so rejected requests are
//! logged too.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use crate::api::types::ApiContext;
use crate::config::APP_VERSION;
use crate::models::RequestLogEntry;

pub async fn log_request(req: Request<axum::body::Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let ctx = req.extensions().get::<ApiContext>().cloned();

    let response = next.run(req).await;

    let entry = RequestLogEntry {
        logged_at: Utc::now(),
        method,
        endpoint: path,
        status: response.status().as_u16(),
        runtime_ms: started.elapsed().as_millis() as u64,
        api_version: APP_VERSION.to_string(),
    };
    tracing::info!(
        target: "audit",
        method = %entry.method,
        endpoint = %entry.endpoint,
        status = entry.status,
        runtime_ms = entry.runtime_ms,
        "request"
    );

    if let Some(ctx) = ctx {
        if let Err(e) = ctx.store.log_request(&entry) {
            tracing::warn!(error = %e, "Failed to write request log");
        }
    }
    response
}
