//! Medical record endpoints.
//!
//! `GET /api/patients/:id/medical-records`
//! `PUT /api/medical-records/:id`
//! `POST /api/medical-records` (record with no appointment)

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext, ApiResponse};
use crate::authorization::Actor;
use crate::models::{ClinicalData, MedicalRecord};

#[derive(Debug, Deserialize)]
pub struct StandaloneRecordBody {
    pub patient_id: String,
    /// Required when an admin authors the record.
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(flatten)]
    pub clinical: ClinicalData,
}

pub async fn list_for_patient(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(patient_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<MedicalRecord>>>, ApiError> {
    let patient_id = parse_id(&patient_id)?;
    let conn = ctx.core.open_db()?;
    let records = ctx.lifecycle(&conn).list_patient_records(&patient_id, &actor)?;
    Ok(Json(ApiResponse::ok(records)))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(record_id): Path<String>,
    payload: Result<Json<ClinicalData>, JsonRejection>,
) -> Result<Json<ApiResponse<MedicalRecord>>, ApiError> {
    let record_id = parse_id(&record_id)?;
    let Json(data) = payload?;
    let conn = ctx.core.open_db()?;
    let record = ctx.lifecycle(&conn).update_medical_record(&record_id, &actor, &data)?;
    Ok(Json(ApiResponse::with_message(record, "Medical record updated")))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<StandaloneRecordBody>, JsonRejection>,
) -> Result<Json<ApiResponse<MedicalRecord>>, ApiError> {
    let Json(body) = payload?;
    let patient_id = parse_id(&body.patient_id)?;
    let doctor_id = body.doctor_id.as_deref().map(parse_id).transpose()?;

    let conn = ctx.core.open_db()?;
    let record =
        ctx.lifecycle(&conn)
            .create_standalone_record(&actor, &patient_id, doctor_id, &body.clinical)?;
    Ok(Json(ApiResponse::with_message(record, "Medical record created")))
}
