//! HTTP router.
//!
//! `/health` is public. Everything under `/api/` requires the shared API
//! key when one is configured.
//!
//! Middleware stack (outermost → innermost):
//! Extension → CORS → Request log → API key check (`/api` only) → Handler

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the full router for `ctx`.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let protected = Router::new()
        .route("/admissions/generate", post(endpoints::generate::generate))
        .route("/letters", delete(endpoints::letters::purge))
        .route("/letters/:admission_id", get(endpoints::letters::latest))
        .route("/letters/:admission_id/history", get(endpoints::letters::history))
        .route(
            "/letters/environment/:environment",
            delete(endpoints::letters::delete_environment),
        )
        .route("/feedback", post(endpoints::feedback::submit))
        .route("/feedback/:admission_id", get(endpoints::feedback::list))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_api_key));

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone());

    Router::new()
        .merge(public)
        .nest("/api", protected)
        .layer(axum::middleware::from_fn(middleware::audit::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers(Any),
        )
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx))
}
