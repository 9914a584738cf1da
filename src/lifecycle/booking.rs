use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{Actor, Role};
use crate::db::{self, now_utc, DatabaseError};
use crate::models::*;
use crate::notify::NotificationKind;

use super::slots::validate_slot;
use super::{Lifecycle, LifecycleError};

/// Unambiguous characters for booking codes (no 0/O, 1/I).
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Fresh codes drawn before a booking gives up on a taken code.
const BOOKING_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `BK-YYMMDD-XXXXXX`, dated by when the booking was made.
pub fn generate_booking_code(booked_on: NaiveDate) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();
    format!("BK-{}-{suffix}", booked_on.format("%y%m%d"))
}

fn is_booking_code_clash(err: &DatabaseError) -> bool {
    matches!(err, DatabaseError::ConstraintViolation(msg) if msg.contains("appointments.booking_code"))
}

/// Insert `appt`, drawing a new code from `next_code` while its booking code
/// is already taken. Slot clashes are returned as they are.
fn insert_with_unique_code(
    conn: &Connection,
    appt: &mut Appointment,
    mut next_code: impl FnMut() -> String,
) -> Result<(), LifecycleError> {
    let mut attempt = 1;
    loop {
        match db::insert_appointment(conn, appt) {
            Ok(()) => return Ok(()),
            Err(e) if is_booking_code_clash(&e) && attempt < BOOKING_CODE_ATTEMPTS => {
                tracing::debug!(booking_code = %appt.booking_code, attempt, "Booking code taken, drawing another");
                appt.booking_code = next_code();
                attempt += 1;
            }
            // Out of codes is a server fault, not a slot conflict
            Err(e) if is_booking_code_clash(&e) => return Err(LifecycleError::Database(e)),
            Err(e) => return Err(e.into()),
        }
    }
}

impl Lifecycle<'_> {
    /// Create a pending appointment for the calling patient.
    pub fn book(&self, actor: &Actor, request: &BookingRequest) -> Result<Appointment, LifecycleError> {
        if actor.role != Role::Patient {
            return Err(LifecycleError::Forbidden("Only patients can book appointments".into()));
        }

        let doctor = db::get_doctor(self.conn, &request.doctor_id)?
            .ok_or_else(|| LifecycleError::not_found("Doctor", request.doctor_id))?;
        let slot = validate_slot(
            self.conn,
            &doctor.id,
            &request.appointment_date,
            &request.start_time,
            &request.end_time,
            None,
        )?;

        let now = now_utc();
        let mut appt = Appointment {
            id: Uuid::new_v4(),
            patient_id: actor.user_id,
            doctor_id: doctor.id,
            hospital_id: doctor.hospital_id,
            specialty_id: doctor.specialty_id,
            service_id: request.service_id,
            appointment_date: request.appointment_date,
            time_slot: slot,
            status: AppointmentStatus::Pending,
            booking_code: generate_booking_code(now.date_naive()),
            symptoms: request.symptoms.clone(),
            medical_history: request.medical_history.clone(),
            notes: request.notes.clone(),
            cancel_reason: None,
            cancelled_at: None,
            completion_date: None,
            medical_record: None,
            version: 0,
            reminder_sent_at: None,
            created_at: now,
            updated_at: now,
        };

        let tx = self.conn.unchecked_transaction()?;
        insert_with_unique_code(&tx, &mut appt, || generate_booking_code(now.date_naive()))?;
        db::insert_appointment_event(
            &tx,
            &AppointmentEvent {
                appointment_id: appt.id,
                from_status: None,
                to_status: AppointmentStatus::Pending,
                actor_user_id: actor.user_id,
                reason: None,
                at: now,
            },
        )?;
        tx.commit()?;

        tracing::info!(
            appointment_id = %appt.id,
            booking_code = %appt.booking_code,
            doctor_id = %doctor.id,
            "Appointment booked"
        );

        self.notify_doctor(
            &appt,
            NotificationKind::Booked,
            format!(
                "New appointment request for {} at {}",
                appt.appointment_date,
                appt.time_slot.start_time.format("%H:%M")
            ),
        );
        Ok(appt)
    }
}
