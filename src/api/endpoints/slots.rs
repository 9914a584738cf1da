//! `GET /api/doctors/:id/slots?date=YYYY-MM-DD`: bookable slots, computed
//! from the doctor's weekly schedule minus held appointments.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_date, parse_id, ApiContext, ApiResponse};
use crate::lifecycle;
use crate::models::TimeSlot;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub date: chrono::NaiveDate,
    pub slots: Vec<TimeSlot>,
}

pub async fn available(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<ApiResponse<SlotsResponse>>, ApiError> {
    let doctor_id = parse_id(&doctor_id)?;
    let date = query
        .date
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Query parameter 'date' is required".into()))
        .and_then(parse_date)?;

    let conn = ctx.core.open_db()?;
    let slots = lifecycle::available_slots(&conn, &doctor_id, &date)?;
    Ok(Json(ApiResponse::ok(SlotsResponse { date, slots })))
}
