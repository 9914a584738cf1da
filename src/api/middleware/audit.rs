//! Audit logging middleware.
//!
//! Records every authenticated request with user, method, path and
//! response status. Runs innermost, after auth has injected the `Actor`.

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::ApiContext;
use crate::authorization::Actor;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Inside the `/api` nest the request URI has the prefix stripped
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let user_id = req.extensions().get::<Actor>().map(|a| a.user_id);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core.record_access(
            user_id.as_ref(),
            &format!("{method} {path}"),
            &format!("status:{status}"),
        );
    }

    response
}
