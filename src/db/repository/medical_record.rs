use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    format_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid, DatabaseError,
};
use crate::models::*;

const RECORD_COLUMNS: &str = "id, patient_id, doctor_id, appointment_id, diagnosis, treatment,
    prescription, notes, created_at, updated_at";

struct RecordRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    appointment_id: Option<String>,
    diagnosis: String,
    treatment: Option<String>,
    prescription: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn record_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        appointment_id: row.get(3)?,
        diagnosis: row.get(4)?,
        treatment: row.get(5)?,
        prescription: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<MedicalRecord, DatabaseError> {
    Ok(MedicalRecord {
        id: parse_uuid("medical_records.id", &row.id)?,
        patient_id: parse_uuid("medical_records.patient_id", &row.patient_id)?,
        doctor_id: parse_uuid("medical_records.doctor_id", &row.doctor_id)?,
        appointment_id: parse_optional_uuid("medical_records.appointment_id", row.appointment_id)?,
        diagnosis: row.diagnosis,
        treatment: row.treatment,
        prescription: serde_json::from_str(&row.prescription)?,
        notes: row.notes,
        created_at: parse_timestamp("medical_records.created_at", &row.created_at)?,
        updated_at: parse_timestamp("medical_records.updated_at", &row.updated_at)?,
    })
}

/// Insert a record. A second record for the same appointment is a `ConstraintViolation`.
pub fn insert_medical_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO medical_records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            record.doctor_id.to_string(),
            record.appointment_id.map(|id| id.to_string()),
            record.diagnosis,
            record.treatment,
            serde_json::to_string(&record.prescription)?,
            record.notes,
            format_timestamp(&record.created_at),
            format_timestamp(&record.updated_at),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

/// Overwrite the clinical fields of an existing record.
pub fn update_medical_record_fields(
    conn: &Connection,
    record: &MedicalRecord,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medical_records SET diagnosis = ?1, treatment = ?2, prescription = ?3,
         notes = ?4, updated_at = ?5 WHERE id = ?6",
        params![
            record.diagnosis,
            record.treatment,
            serde_json::to_string(&record.prescription)?,
            record.notes,
            format_timestamp(&record.updated_at),
            record.id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "MedicalRecord".into(),
            id: record.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_medical_record(conn: &Connection, id: &Uuid) -> Result<Option<MedicalRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM medical_records WHERE id = ?1"),
            params![id.to_string()],
            record_row_from_rusqlite,
        )
        .optional()?;
    row.map(record_from_row).transpose()
}

pub fn get_medical_record_by_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<MedicalRecord>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM medical_records WHERE appointment_id = ?1"),
            params![appointment_id.to_string()],
            record_row_from_rusqlite,
        )
        .optional()?;
    row.map(record_from_row).transpose()
}

/// A patient's records, newest first.
pub fn list_medical_records_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM medical_records WHERE patient_id = ?1
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], |row| {
        Ok(record_row_from_rusqlite(row))
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row??)?);
    }
    Ok(records)
}

pub fn count_medical_records_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM medical_records WHERE appointment_id = ?1",
        params![appointment_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}
