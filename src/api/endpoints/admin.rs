//! Admin consistency endpoints.
//!
//! `GET /api/admin/consistency` reports drift between appointments and
//! medical records; `POST` repairs it.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse};
use crate::authorization::Actor;
use crate::db::{self, ConsistencyReport};

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub repaired: usize,
    pub remaining: ConsistencyReport,
}

fn require_admin(actor: &Actor) -> Result<(), ApiError> {
    if actor.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = %actor.user_id, "Non-admin attempted consistency access");
        Err(ApiError::Forbidden("Admin access required".into()))
    }
}

pub async fn check(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<ConsistencyReport>>, ApiError> {
    require_admin(&actor)?;
    let conn = ctx.core.open_db()?;
    let report = db::check_consistency(&conn)?;
    Ok(Json(ApiResponse::ok(report)))
}

pub async fn repair(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<RepairResponse>>, ApiError> {
    require_admin(&actor)?;
    let conn = ctx.core.open_db()?;
    let repaired = db::repair_consistency(&conn)?;
    let remaining = db::check_consistency(&conn)?;
    tracing::info!(user_id = %actor.user_id, repaired, "Consistency repair run");
    Ok(Json(ApiResponse::ok(RepairResponse { repaired, remaining })))
}
