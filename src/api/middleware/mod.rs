//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth: bearer session → `Actor`
//! 2. Audit: one `audit_log` row per request, after auth so it has the user

pub mod audit;
pub mod auth;
