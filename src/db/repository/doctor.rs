use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_optional_uuid, parse_uuid, DatabaseError};
use crate::models::*;

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, user_id, hospital_id, specialty_id, name)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            doctor.id.to_string(),
            doctor.user_id.to_string(),
            doctor.hospital_id.to_string(),
            doctor.specialty_id.map(|id| id.to_string()),
            doctor.name,
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

fn doctor_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<(String, String, String, Option<String>, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn doctor_from_row(
    (id, user_id, hospital_id, specialty_id, name): (String, String, String, Option<String>, String),
) -> Result<Doctor, DatabaseError> {
    Ok(Doctor {
        id: parse_uuid("doctors.id", &id)?,
        user_id: parse_uuid("doctors.user_id", &user_id)?,
        hospital_id: parse_uuid("doctors.hospital_id", &hospital_id)?,
        specialty_id: parse_optional_uuid("doctors.specialty_id", specialty_id)?,
        name,
    })
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, user_id, hospital_id, specialty_id, name FROM doctors WHERE id = ?1",
            params![id.to_string()],
            doctor_from_rusqlite,
        )
        .optional()?;
    row.map(doctor_from_row).transpose()
}

/// Resolve the doctor profile a login account acts for.
pub fn get_doctor_by_user(conn: &Connection, user_id: &Uuid) -> Result<Option<Doctor>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, user_id, hospital_id, specialty_id, name FROM doctors WHERE user_id = ?1",
            params![user_id.to_string()],
            doctor_from_rusqlite,
        )
        .optional()?;
    row.map(doctor_from_row).transpose()
}
