//! Slot availability, computed live from appointment status.
//!
//! A slot is held while some appointment on it is pending, confirmed or
//! rescheduled. Cancel, reject and no-show release it with no extra write.
//! Partial unique indexes back this up against racing bookings.

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::models::TimeSlot;

use super::LifecycleError;

/// Schedule weekday index (Monday = 0) for a date.
pub fn weekday_index(date: &NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Judged on the UTC clock, like every schedule time (see `config::SCHEDULE_CLOCK`).
fn has_started(date: &NaiveDate, start: &NaiveTime) -> bool {
    let now = Utc::now().naive_utc();
    let today = now.date();
    *date < today || (*date == today && *start <= now.time())
}

/// Whether the doctor's slot starting at `start` on `date` is taken by an
/// appointment other than `exclude`.
pub fn is_slot_held(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
    start: &NaiveTime,
    exclude: Option<&Uuid>,
) -> Result<bool, LifecycleError> {
    Ok(db::is_doctor_slot_held(conn, doctor_id, date, start, exclude)?)
}

/// Bookable slots for a doctor on a date, in schedule order.
pub fn available_slots(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
) -> Result<Vec<TimeSlot>, LifecycleError> {
    if db::get_doctor(conn, doctor_id)?.is_none() {
        return Err(LifecycleError::not_found("Doctor", doctor_id));
    }

    let schedule = db::get_time_slots_for_weekday(conn, doctor_id, weekday_index(date))?;
    let held = db::held_start_times(conn, doctor_id, date)?;

    let mut slots = Vec::new();
    for entry in schedule {
        if held.contains(&entry.start_time) || has_started(date, &entry.start_time) {
            continue;
        }
        if let Some(room_id) = &entry.room_id {
            if db::is_room_slot_held(conn, room_id, date, &entry.start_time, None)? {
                continue;
            }
        }
        slots.push(TimeSlot {
            start_time: entry.start_time,
            end_time: entry.end_time,
            room_id: entry.room_id,
        });
    }
    Ok(slots)
}

/// Check that (`date`, `start`–`end`) is in the doctor's schedule, not in
/// the past, and free. Returns the concrete slot with its room.
///
/// `exclude` is the appointment being moved, so it does not block itself.
pub fn validate_slot(
    conn: &Connection,
    doctor_id: &Uuid,
    date: &NaiveDate,
    start: &NaiveTime,
    end: &NaiveTime,
    exclude: Option<&Uuid>,
) -> Result<TimeSlot, LifecycleError> {
    if end <= start {
        return Err(LifecycleError::InvalidInput(
            "Slot end time must be after its start time".into(),
        ));
    }
    if has_started(date, start) {
        return Err(LifecycleError::InvalidInput(
            "Cannot book a slot in the past".into(),
        ));
    }

    let entry = db::get_time_slots_for_weekday(conn, doctor_id, weekday_index(date))?
        .into_iter()
        .find(|e| e.start_time == *start && e.end_time == *end)
        .ok_or_else(|| {
            LifecycleError::InvalidInput(format!(
                "{}-{} on {date} is not in the doctor's schedule",
                start.format("%H:%M"),
                end.format("%H:%M")
            ))
        })?;

    if is_slot_held(conn, doctor_id, date, start, exclude)? {
        return Err(LifecycleError::Conflict("Time slot is already booked".into()));
    }
    if let Some(room_id) = &entry.room_id {
        if db::is_room_slot_held(conn, room_id, date, start, exclude)? {
            return Err(LifecycleError::Conflict("Room is already booked for this slot".into()));
        }
    }

    Ok(TimeSlot {
        start_time: entry.start_time,
        end_time: entry.end_time,
        room_id: entry.room_id,
    })
}
