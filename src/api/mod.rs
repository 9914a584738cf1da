//! HTTP API.
//!
//! Exposes the appointment lifecycle, slot search and medical records as
//! JSON endpoints under `/api/`. Everything except `/health` and
//! `/auth/login` sits behind bearer-session auth and the audit logger.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ApiServerInfo};
pub use types::ApiContext;
