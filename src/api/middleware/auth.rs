//! Shared API key check.
//!
//! Compares the SHA-256 of the `X-API-KEY` header against the configured
//! key's digest in constant time. When no key is configured every request
//! passes.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::api::error::ApiError;
use crate::api::types::{hash_key, ApiContext};

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_api_key(req: Request<axum::body::Body>, next: Next) -> Response {
    match check(&req) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

fn check(req: &Request<axum::body::Body>) -> Result<(), ApiError> {
    let ctx = req
        .extensions()
        .get::<ApiContext>()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let Some(expected) = ctx.api_key_hash() else {
        return Ok(());
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if hash_key(provided).ct_eq(expected).unwrap_u8() == 0 {
        tracing::warn!(target: "audit", path = %req.uri().path(), "API key rejected");
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}
