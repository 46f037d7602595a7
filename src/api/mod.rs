//! HTTP API.
//!
//! Generation, retrieval, purge and feedback endpoints over the pipeline
//! and letter store. Routes under `/api/` are protected by the shared API
//! key; every request is written to the request log.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve_until_ctrl_c, start_server, ApiServer};
pub use types::ApiContext;
