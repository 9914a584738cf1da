//! Appointment endpoints: booking, listing and every lifecycle transition.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_date, parse_id, parse_time, ApiContext, ApiResponse};
use crate::authorization::Actor;
use crate::lifecycle::BookingRequest;
use crate::models::{Appointment, AppointmentEvent, ClinicalData, MedicalRecord};

type AppointmentResult = Result<Json<ApiResponse<Appointment>>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct BookBody {
    pub doctor_id: String,
    pub appointment_date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookBody {
    fn into_request(self) -> Result<BookingRequest, ApiError> {
        Ok(BookingRequest {
            doctor_id: parse_id(&self.doctor_id)?,
            appointment_date: parse_date(&self.appointment_date)?,
            start_time: parse_time(&self.start_time)?,
            end_time: parse_time(&self.end_time)?,
            service_id: self.service_id.as_deref().map(parse_id).transpose()?,
            symptoms: self.symptoms,
            medical_history: self.medical_history,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleBody {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

/// `POST /api/appointments`
pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<BookBody>, JsonRejection>,
) -> AppointmentResult {
    let Json(body) = payload?;
    let request = body.into_request()?;
    let conn = ctx.core.open_db()?;
    let appt = ctx.lifecycle(&conn).book(&actor, &request)?;
    Ok(Json(ApiResponse::with_message(appt, "Appointment booked")))
}

/// `GET /api/appointments`: scoped to the caller's role.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ApiResponse<Vec<Appointment>>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointments = ctx.lifecycle(&conn).list_for_actor(&actor)?;
    Ok(Json(ApiResponse::ok(appointments)))
}

/// `GET /api/appointments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> AppointmentResult {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let appt = ctx.lifecycle(&conn).get_appointment(&id, &actor)?;
    Ok(Json(ApiResponse::ok(appt)))
}

/// `GET /api/bookings/:code`
pub async fn by_code(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(code): Path<String>,
) -> AppointmentResult {
    let conn = ctx.core.open_db()?;
    let appt = ctx.lifecycle(&conn).find_by_booking_code(&code, &actor)?;
    Ok(Json(ApiResponse::ok(appt)))
}

/// `GET /api/appointments/:id/events`
pub async fn events(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<AppointmentEvent>>>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let events = ctx.lifecycle(&conn).events(&id, &actor)?;
    Ok(Json(ApiResponse::ok(events)))
}

/// `PUT /api/appointments/:id/confirmed`
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> AppointmentResult {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let appt = ctx.lifecycle(&conn).confirm(&id, &actor)?;
    Ok(Json(ApiResponse::with_message(appt, "Appointment confirmed")))
}

/// `PUT /api/appointments/:id/reject`
pub async fn reject(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> AppointmentResult {
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    let conn = ctx.core.open_db()?;
    let reason = body.reason.unwrap_or_default();
    let appt = ctx.lifecycle(&conn).reject(&id, &actor, &reason)?;
    Ok(Json(ApiResponse::with_message(appt, "Appointment rejected")))
}

/// `PATCH /api/appointments/:id/cancel`: the body is optional.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Option<Json<ReasonBody>>,
) -> AppointmentResult {
    let id = parse_id(&id)?;
    let reason = payload.and_then(|Json(body)| body.reason);
    let conn = ctx.core.open_db()?;
    let appt = ctx.lifecycle(&conn).cancel(&id, &actor, reason.as_deref())?;
    Ok(Json(ApiResponse::with_message(appt, "Appointment cancelled")))
}

/// `PUT /api/appointments/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<ClinicalData>, JsonRejection>,
) -> AppointmentResult {
    let id = parse_id(&id)?;
    let Json(data) = payload?;
    let conn = ctx.core.open_db()?;
    let appt = ctx.lifecycle(&conn).complete(&id, &actor, &data)?;
    Ok(Json(ApiResponse::with_message(appt, "Appointment completed")))
}

/// `PATCH /api/appointments/:id/reschedule`
pub async fn reschedule(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<RescheduleBody>, JsonRejection>,
) -> AppointmentResult {
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    let date = parse_date(&body.date)?;
    let start = parse_time(&body.start_time)?;
    let end = parse_time(&body.end_time)?;

    let conn = ctx.core.open_db()?;
    let appt = ctx.lifecycle(&conn).reschedule(&id, &actor, date, start, end)?;
    Ok(Json(ApiResponse::with_message(appt, "Appointment rescheduled")))
}

/// `PUT /api/appointments/:id/no-show`
pub async fn no_show(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> AppointmentResult {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let appt = ctx.lifecycle(&conn).mark_no_show(&id, &actor)?;
    Ok(Json(ApiResponse::with_message(appt, "Appointment marked as no-show")))
}

/// `GET /api/appointments/:id/medical-record`
pub async fn medical_record(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MedicalRecord>>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let record = ctx.lifecycle(&conn).get_record_for_appointment(&id, &actor)?;
    Ok(Json(ApiResponse::ok(record)))
}
