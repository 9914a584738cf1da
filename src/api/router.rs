//! HTTP API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS + security headers → 2. Auth validator → 3. Audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers apply bottom (outermost) to top (innermost):
    //   Extension → Auth → Audit → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::book),
        )
        .route("/appointments/:id", get(endpoints::appointments::detail))
        .route("/appointments/:id/events", get(endpoints::appointments::events))
        .route(
            "/appointments/:id/medical-record",
            get(endpoints::appointments::medical_record),
        )
        .route("/appointments/:id/confirmed", put(endpoints::appointments::confirm))
        .route("/appointments/:id/reject", put(endpoints::appointments::reject))
        .route("/appointments/:id/cancel", patch(endpoints::appointments::cancel))
        .route("/appointments/:id/complete", put(endpoints::appointments::complete))
        .route(
            "/appointments/:id/reschedule",
            patch(endpoints::appointments::reschedule),
        )
        .route("/appointments/:id/no-show", put(endpoints::appointments::no_show))
        .route("/bookings/:code", get(endpoints::appointments::by_code))
        .route("/doctors/:id/slots", get(endpoints::slots::available))
        .route(
            "/patients/:id/medical-records",
            get(endpoints::records::list_for_patient),
        )
        .route("/medical-records", post(endpoints::records::create))
        .route("/medical-records/:id", put(endpoints::records::update))
        .route(
            "/admin/consistency",
            get(endpoints::admin::check).post(endpoints::admin::repair),
        )
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/me", get(endpoints::auth::me))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors)
}
