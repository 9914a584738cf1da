//! Session endpoints.
//!
//! `POST /api/auth/login`: unprotected, exchanges credentials for a token
//! `POST /api/auth/logout`: drops the caller's session
//! `GET /api/auth/me`: the caller's identity and role

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ApiResponse, BearerToken};
use crate::auth;
use crate::authorization::{Actor, Role};
use crate::models::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub name: String,
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
}

pub async fn login(
    State(ctx): State<ApiContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let Json(request) = payload?;
    let conn = ctx.core.open_db()?;
    let session = auth::login(&conn, &request.email, &request.password, ctx.core.session_ttl)?;

    Ok(Json(ApiResponse::ok(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: session.user,
    })))
}

pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let conn = ctx.core.open_db()?;
    auth::logout(&conn, &token)?;
    Ok(Json(ApiResponse::message("Logged out")))
}

pub async fn me(Extension(actor): Extension<Actor>) -> Json<ApiResponse<MeResponse>> {
    let role = match actor.role {
        Role::Patient => "patient",
        Role::Doctor { .. } => "doctor",
        Role::Admin => "admin",
    };
    Json(ApiResponse::ok(MeResponse {
        user_id: actor.user_id,
        doctor_id: actor.doctor_id(),
        name: actor.name,
        role,
    }))
}
