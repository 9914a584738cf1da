use chrono::NaiveTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{parse_optional_uuid, parse_uuid, DatabaseError};
use crate::models::*;

const TIME_FORMAT: &str = "%H:%M";

pub fn format_time(time: &NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn parse_time(field: &str, value: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT).map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}

pub fn insert_time_slot(conn: &Connection, slot: &DoctorTimeSlot) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctor_time_slots (id, doctor_id, weekday, start_time, end_time, room_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            slot.id.to_string(),
            slot.doctor_id.to_string(),
            slot.weekday,
            format_time(&slot.start_time),
            format_time(&slot.end_time),
            slot.room_id.map(|id| id.to_string()),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

/// Schedule entries for one doctor on one weekday, ordered by start time.
pub fn get_time_slots_for_weekday(
    conn: &Connection,
    doctor_id: &Uuid,
    weekday: u8,
) -> Result<Vec<DoctorTimeSlot>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, doctor_id, weekday, start_time, end_time, room_id
         FROM doctor_time_slots WHERE doctor_id = ?1 AND weekday = ?2
         ORDER BY start_time",
    )?;

    let rows = stmt.query_map(params![doctor_id.to_string(), weekday], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, u8>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
        ))
    })?;

    let mut slots = Vec::new();
    for row in rows {
        let (id, doctor_id, weekday, start, end, room_id) = row?;
        slots.push(DoctorTimeSlot {
            id: parse_uuid("doctor_time_slots.id", &id)?,
            doctor_id: parse_uuid("doctor_time_slots.doctor_id", &doctor_id)?,
            weekday,
            start_time: parse_time("doctor_time_slots.start_time", &start)?,
            end_time: parse_time("doctor_time_slots.end_time", &end)?,
            room_id: parse_optional_uuid("doctor_time_slots.room_id", room_id)?,
        });
    }
    Ok(slots)
}
