use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::schedule::{format_time, parse_time};
use crate::db::{
    format_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid, DatabaseError,
};
use crate::models::*;

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, hospital_id, specialty_id, service_id,
    appointment_date, start_time, end_time, room_id, status, booking_code, symptoms,
    medical_history, notes, cancel_reason, cancelled_at, completion_date, medical_record,
    version, reminder_sent_at, created_at, updated_at";

/// Raw column values before parsing into domain types.
struct AppointmentRow {
    id: String,
    patient_id: String,
    doctor_id: String,
    hospital_id: String,
    specialty_id: Option<String>,
    service_id: Option<String>,
    appointment_date: String,
    start_time: String,
    end_time: String,
    room_id: Option<String>,
    status: String,
    booking_code: String,
    symptoms: Option<String>,
    medical_history: Option<String>,
    notes: Option<String>,
    cancel_reason: Option<String>,
    cancelled_at: Option<String>,
    completion_date: Option<String>,
    medical_record: Option<String>,
    version: i64,
    reminder_sent_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn appointment_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        doctor_id: row.get(2)?,
        hospital_id: row.get(3)?,
        specialty_id: row.get(4)?,
        service_id: row.get(5)?,
        appointment_date: row.get(6)?,
        start_time: row.get(7)?,
        end_time: row.get(8)?,
        room_id: row.get(9)?,
        status: row.get(10)?,
        booking_code: row.get(11)?,
        symptoms: row.get(12)?,
        medical_history: row.get(13)?,
        notes: row.get(14)?,
        cancel_reason: row.get(15)?,
        cancelled_at: row.get(16)?,
        completion_date: row.get(17)?,
        medical_record: row.get(18)?,
        version: row.get(19)?,
        reminder_sent_at: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    let medical_record = row
        .medical_record
        .as_deref()
        .map(serde_json::from_str::<MedicalRecordSnapshot>)
        .transpose()?;

    Ok(Appointment {
        id: parse_uuid("appointments.id", &row.id)?,
        patient_id: parse_uuid("appointments.patient_id", &row.patient_id)?,
        doctor_id: parse_uuid("appointments.doctor_id", &row.doctor_id)?,
        hospital_id: parse_uuid("appointments.hospital_id", &row.hospital_id)?,
        specialty_id: parse_optional_uuid("appointments.specialty_id", row.specialty_id)?,
        service_id: parse_optional_uuid("appointments.service_id", row.service_id)?,
        appointment_date: parse_date("appointments.appointment_date", &row.appointment_date)?,
        time_slot: TimeSlot {
            start_time: parse_time("appointments.start_time", &row.start_time)?,
            end_time: parse_time("appointments.end_time", &row.end_time)?,
            room_id: parse_optional_uuid("appointments.room_id", row.room_id)?,
        },
        status: AppointmentStatus::from_str(&row.status)?,
        booking_code: row.booking_code,
        symptoms: row.symptoms,
        medical_history: row.medical_history,
        notes: row.notes,
        cancel_reason: row.cancel_reason,
        cancelled_at: row
            .cancelled_at
            .map(|t| parse_timestamp("appointments.cancelled_at", &t))
            .transpose()?,
        completion_date: row
            .completion_date
            .map(|t| parse_timestamp("appointments.completion_date", &t))
            .transpose()?,
        medical_record,
        version: row.version,
        reminder_sent_at: row
            .reminder_sent_at
            .map(|t| parse_timestamp("appointments.reminder_sent_at", &t))
            .transpose()?,
        created_at: parse_timestamp("appointments.created_at", &row.created_at)?,
        updated_at: parse_timestamp("appointments.updated_at", &row.updated_at)?,
    })
}

fn snapshot_json(appt: &Appointment) -> Result<Option<String>, DatabaseError> {
    Ok(appt
        .medical_record
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?)
}

/// Insert a new appointment. A held-slot collision surfaces as `ConstraintViolation`.
pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO appointments ({APPOINTMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23)"
        ),
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.doctor_id.to_string(),
            appt.hospital_id.to_string(),
            appt.specialty_id.map(|id| id.to_string()),
            appt.service_id.map(|id| id.to_string()),
            appt.appointment_date.to_string(),
            format_time(&appt.time_slot.start_time),
            format_time(&appt.time_slot.end_time),
            appt.time_slot.room_id.map(|id| id.to_string()),
            appt.status.as_str(),
            appt.booking_code,
            appt.symptoms,
            appt.medical_history,
            appt.notes,
            appt.cancel_reason,
            appt.cancelled_at.map(|t| format_timestamp(&t)),
            appt.completion_date.map(|t| format_timestamp(&t)),
            snapshot_json(appt)?,
            appt.version,
            appt.reminder_sent_at.map(|t| format_timestamp(&t)),
            format_timestamp(&appt.created_at),
            format_timestamp(&appt.updated_at),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id.to_string()],
            appointment_row_from_rusqlite,
        )
        .optional()?;
    row.map(appointment_from_row).transpose()
}

pub fn get_appointment_by_booking_code(
    conn: &Connection,
    code: &str,
) -> Result<Option<Appointment>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE booking_code = ?1"),
            params![code],
            appointment_row_from_rusqlite,
        )
        .optional()?;
    row.map(appointment_from_row).transpose()
}

fn query_appointments(
    conn: &Connection,
    where_clause: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments {where_clause}
         ORDER BY appointment_date DESC, start_time DESC"
    ))?;
    let rows = stmt.query_map(params, |row| Ok(appointment_row_from_rusqlite(row)))?;

    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(appointment_from_row(row??)?);
    }
    Ok(appointments)
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(conn, "WHERE patient_id = ?1", params![patient_id.to_string()])
}

pub fn list_appointments_for_doctor(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(conn, "WHERE doctor_id = ?1", params![doctor_id.to_string()])
}

pub fn list_all_appointments(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(conn, "", params![])
}

/// Holding appointments on `date` that have not been reminded yet.
pub fn list_due_for_reminder(
    conn: &Connection,
    date: &NaiveDate,
) -> Result<Vec<Appointment>, DatabaseError> {
    query_appointments(
        conn,
        "WHERE appointment_date = ?1
           AND status IN ('pending', 'confirmed', 'rescheduled')
           AND reminder_sent_at IS NULL",
        params![date.to_string()],
    )
}

/// Write every mutable column of `appt` if the stored version still equals
/// `appt.version`, bumping it by one. Returns `false` when another writer won.
pub fn update_appointment_versioned(
    conn: &Connection,
    appt: &Appointment,
) -> Result<bool, DatabaseError> {
    let updated = conn
        .execute(
            "UPDATE appointments SET
                appointment_date = ?1, start_time = ?2, end_time = ?3, room_id = ?4,
                status = ?5, cancel_reason = ?6, cancelled_at = ?7, completion_date = ?8,
                medical_record = ?9, reminder_sent_at = ?10, updated_at = ?11,
                version = version + 1
             WHERE id = ?12 AND version = ?13",
            params![
                appt.appointment_date.to_string(),
                format_time(&appt.time_slot.start_time),
                format_time(&appt.time_slot.end_time),
                appt.time_slot.room_id.map(|id| id.to_string()),
                appt.status.as_str(),
                appt.cancel_reason,
                appt.cancelled_at.map(|t| format_timestamp(&t)),
                appt.completion_date.map(|t| format_timestamp(&t)),
                snapshot_json(appt)?,
                appt.reminder_sent_at.map(|t| format_timestamp(&t)),
                format_timestamp(&appt.updated_at),
                appt.id.to_string(),
                appt.version,
            ],
        )
        .map_err(DatabaseError::from_write)?;
    Ok(updated == 1)
}

/// Overwrite only the embedded medical-record snapshot.
pub fn set_medical_record_snapshot(
    conn: &Connection,
    appointment_id: &Uuid,
    snapshot: Option<&MedicalRecordSnapshot>,
) -> Result<(), DatabaseError> {
    let json = snapshot.map(serde_json::to_string).transpose()?;
    conn.execute(
        "UPDATE appointments SET medical_record = ?1 WHERE id = ?2",
        params![json, appointment_id.to_string()],
    )?;
    Ok(())
}

/// Stamp the reminder and bump `version`, so a transition holding an older
/// copy fails its guard instead of writing `reminder_sent_at` back to NULL.
pub fn mark_reminder_sent(
    conn: &Connection,
    appointment_id: &Uuid,
    at: &chrono::DateTime<chrono::Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE appointments SET reminder_sent_at = ?1, version = version + 1 WHERE id = ?2",
        params![format_timestamp(at), appointment_id.to_string()],
    )?;
    Ok(())
}

/// Whether a holding appointment other than `exclude` occupies the doctor's slot.
pub fn is_doctor_slot_held(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
    start_time: &NaiveTime,
    exclude: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE doctor_id = ?1 AND appointment_date = ?2 AND start_time = ?3
           AND status IN ('pending', 'confirmed', 'rescheduled')
           AND id != ?4",
        params![
            doctor_id.to_string(),
            date.to_string(),
            format_time(start_time),
            exclude.map(|id| id.to_string()).unwrap_or_default(),
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether a holding appointment other than `exclude` occupies the room.
pub fn is_room_slot_held(
    conn: &Connection,
    room_id: &Uuid,
    date: &NaiveDate,
    start_time: &NaiveTime,
    exclude: Option<&Uuid>,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE room_id = ?1 AND appointment_date = ?2 AND start_time = ?3
           AND status IN ('pending', 'confirmed', 'rescheduled')
           AND id != ?4",
        params![
            room_id.to_string(),
            date.to_string(),
            format_time(start_time),
            exclude.map(|id| id.to_string()).unwrap_or_default(),
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Start times currently held for a doctor on a date.
pub fn held_start_times(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
) -> Result<Vec<NaiveTime>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT start_time FROM appointments
         WHERE doctor_id = ?1 AND appointment_date = ?2
           AND status IN ('pending', 'confirmed', 'rescheduled')",
    )?;
    let rows = stmt.query_map(params![doctor_id.to_string(), date.to_string()], |row| {
        row.get::<_, String>(0)
    })?;

    let mut times = Vec::new();
    for row in rows {
        times.push(parse_time("appointments.start_time", &row?)?);
    }
    Ok(times)
}

pub fn insert_appointment_event(
    conn: &Connection,
    event: &AppointmentEvent,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_events (appointment_id, from_status, to_status, actor_user_id, reason, at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.appointment_id.to_string(),
            event.from_status.map(|s| s.as_str()),
            event.to_status.as_str(),
            event.actor_user_id.to_string(),
            event.reason,
            format_timestamp(&event.at),
        ],
    )?;
    Ok(())
}

/// Status history of one appointment, oldest first.
pub fn list_appointment_events(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<AppointmentEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT appointment_id, from_status, to_status, actor_user_id, reason, at
         FROM appointment_events WHERE appointment_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (appointment_id, from_status, to_status, actor, reason, at) = row?;
        events.push(AppointmentEvent {
            appointment_id: parse_uuid("appointment_events.appointment_id", &appointment_id)?,
            from_status: from_status
                .as_deref()
                .map(AppointmentStatus::from_str)
                .transpose()?,
            to_status: AppointmentStatus::from_str(&to_status)?,
            actor_user_id: parse_uuid("appointment_events.actor_user_id", &actor)?,
            reason,
            at: parse_timestamp("appointment_events.at", &at)?,
        });
    }
    Ok(events)
}
