//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Request log: every request, including rejected ones
//! 2. API key check: `/api` routes only

pub mod audit;
pub mod auth;
