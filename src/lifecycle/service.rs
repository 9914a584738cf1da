use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{authorize, Actor, Capability, Role};
use crate::db::{self, now_utc};
use crate::models::*;
use crate::notify::{dispatch, Notification, NotificationKind, Notifier};

use super::records::{upsert_for_appointment, validate_clinical_data};
use super::slots::validate_slot;
use super::transitions::ensure_transition;
use super::LifecycleError;

/// Appointment operations over one connection.
///
/// Construct per request; it borrows the connection and the notifier.
pub struct Lifecycle<'a> {
    pub(crate) conn: &'a Connection,
    pub(crate) notifier: &'a dyn Notifier,
}

impl<'a> Lifecycle<'a> {
    pub fn new(conn: &'a Connection, notifier: &'a dyn Notifier) -> Self {
        Self { conn, notifier }
    }

    pub(crate) fn load(&self, id: &Uuid) -> Result<Appointment, LifecycleError> {
        db::get_appointment(self.conn, id)?
            .ok_or_else(|| LifecycleError::not_found("Appointment", id))
    }

    pub(crate) fn require(
        &self,
        actor: &Actor,
        appt: &Appointment,
        capability: Capability,
        action: &str,
    ) -> Result<(), LifecycleError> {
        let reason = authorize(actor, appt, capability);
        if reason.allowed() {
            tracing::debug!(user_id = %actor.user_id, appointment_id = %appt.id, ?reason, action, "Access granted");
            Ok(())
        } else {
            tracing::warn!(user_id = %actor.user_id, appointment_id = %appt.id, action, "Access denied");
            Err(LifecycleError::Forbidden(format!(
                "Not allowed to {action} this appointment"
            )))
        }
    }

    /// Persist `appt` under its version guard and append the history event.
    /// Runs inside the caller's transaction.
    pub(crate) fn write_transition(
        conn: &Connection,
        actor: &Actor,
        from: Option<AppointmentStatus>,
        appt: &Appointment,
        reason: Option<&str>,
    ) -> Result<(), LifecycleError> {
        if !db::update_appointment_versioned(conn, appt)? {
            return Err(LifecycleError::Conflict(
                "Appointment was modified by another request; reload and retry".into(),
            ));
        }
        db::insert_appointment_event(
            conn,
            &AppointmentEvent {
                appointment_id: appt.id,
                from_status: from,
                to_status: appt.status,
                actor_user_id: actor.user_id,
                reason: reason.map(str::to_string),
                at: appt.updated_at,
            },
        )?;
        Ok(())
    }

    fn commit(
        &self,
        actor: &Actor,
        from: AppointmentStatus,
        appt: &mut Appointment,
        reason: Option<&str>,
    ) -> Result<(), LifecycleError> {
        let tx = self.conn.unchecked_transaction()?;
        Self::write_transition(&tx, actor, Some(from), appt, reason)?;
        tx.commit()?;
        appt.version += 1;

        tracing::info!(
            appointment_id = %appt.id,
            %from,
            to = %appt.status,
            user_id = %actor.user_id,
            "Appointment status changed"
        );
        Ok(())
    }

    // ── notifications ──────────────────────────────────────

    fn doctor_user_id(&self, appt: &Appointment) -> Option<Uuid> {
        match db::get_doctor(self.conn, &appt.doctor_id) {
            Ok(doctor) => doctor.map(|d| d.user_id),
            Err(e) => {
                tracing::warn!(appointment_id = %appt.id, error = %e, "Cannot resolve doctor for notification");
                None
            }
        }
    }

    pub(crate) fn notify(&self, recipient: Uuid, appt: &Appointment, kind: NotificationKind, message: String) {
        dispatch(
            self.notifier,
            Notification {
                recipient_user_id: recipient,
                appointment_id: appt.id,
                kind,
                message,
            },
        );
    }

    pub(crate) fn notify_doctor(&self, appt: &Appointment, kind: NotificationKind, message: String) {
        if let Some(user_id) = self.doctor_user_id(appt) {
            self.notify(user_id, appt, kind, message);
        }
    }

    /// Tell whichever participants did not perform the action.
    fn notify_others(&self, actor: &Actor, appt: &Appointment, kind: NotificationKind, message: String) {
        if !actor.is_patient_of(appt) {
            self.notify(appt.patient_id, appt, kind, message.clone());
        }
        if !actor.is_doctor_of(appt) {
            self.notify_doctor(appt, kind, message);
        }
    }

    fn slot_label(appt: &Appointment) -> String {
        format!(
            "{} at {}",
            appt.appointment_date,
            appt.time_slot.start_time.format("%H:%M")
        )
    }

    // ── state machine ──────────────────────────────────────

    /// pending|rescheduled → confirmed. Assigned doctor only.
    pub fn confirm(&self, id: &Uuid, actor: &Actor) -> Result<Appointment, LifecycleError> {
        let mut appt = self.load(id)?;
        self.require(actor, &appt, Capability::AssignedDoctor, "confirm")?;
        ensure_transition(appt.status, AppointmentStatus::Confirmed)?;

        let from = appt.status;
        appt.status = AppointmentStatus::Confirmed;
        appt.updated_at = now_utc();
        self.commit(actor, from, &mut appt, None)?;

        self.notify(
            appt.patient_id,
            &appt,
            NotificationKind::Confirmed,
            format!("Your appointment on {} is confirmed", Self::slot_label(&appt)),
        );
        Ok(appt)
    }

    /// pending|rescheduled → rejected with a mandatory reason.
    pub fn reject(&self, id: &Uuid, actor: &Actor, reason: &str) -> Result<Appointment, LifecycleError> {
        let mut appt = self.load(id)?;
        self.require(actor, &appt, Capability::AssignedDoctor, "reject")?;
        ensure_transition(appt.status, AppointmentStatus::Rejected)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LifecycleError::InvalidInput("A rejection reason is required".into()));
        }

        let from = appt.status;
        appt.status = AppointmentStatus::Rejected;
        appt.cancel_reason = Some(reason.to_string());
        appt.updated_at = now_utc();
        self.commit(actor, from, &mut appt, Some(reason))?;

        self.notify(
            appt.patient_id,
            &appt,
            NotificationKind::Rejected,
            format!("Your appointment on {} was declined: {reason}", Self::slot_label(&appt)),
        );
        Ok(appt)
    }

    /// Any non-terminal status → cancelled. Patient, assigned doctor or admin.
    /// A blank reason records who cancelled.
    pub fn cancel(
        &self,
        id: &Uuid,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<Appointment, LifecycleError> {
        let mut appt = self.load(id)?;
        self.require(actor, &appt, Capability::Participant, "cancel")?;
        ensure_transition(appt.status, AppointmentStatus::Cancelled)?;

        let reason = match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => r.to_string(),
            None => match actor.role {
                Role::Patient => "Cancelled by patient".to_string(),
                Role::Doctor { .. } => "Cancelled by doctor".to_string(),
                Role::Admin => "Cancelled by admin".to_string(),
            },
        };

        let now = now_utc();
        let from = appt.status;
        appt.status = AppointmentStatus::Cancelled;
        appt.cancel_reason = Some(reason.clone());
        appt.cancelled_at = Some(now);
        appt.updated_at = now;
        self.commit(actor, from, &mut appt, Some(&reason))?;

        self.notify_others(
            actor,
            &appt,
            NotificationKind::Cancelled,
            format!("Appointment on {} was cancelled: {reason}", Self::slot_label(&appt)),
        );
        Ok(appt)
    }

    /// confirmed → completed, writing the medical record and its snapshot
    /// in one transaction. A second call fails on state and never adds a
    /// record.
    pub fn complete(
        &self,
        id: &Uuid,
        actor: &Actor,
        data: &ClinicalData,
    ) -> Result<Appointment, LifecycleError> {
        let mut appt = self.load(id)?;
        self.require(actor, &appt, Capability::AssignedDoctor, "complete")?;
        ensure_transition(appt.status, AppointmentStatus::Completed)?;
        let data = validate_clinical_data(data)?;

        let now = now_utc();
        let from = appt.status;

        let tx = self.conn.unchecked_transaction()?;
        let record = upsert_for_appointment(&tx, &appt, &data, now)?;
        appt.medical_record = Some(MedicalRecordSnapshot::from(&record));
        appt.status = AppointmentStatus::Completed;
        appt.completion_date = Some(now);
        appt.updated_at = now;
        Self::write_transition(&tx, actor, Some(from), &appt, None)?;
        tx.commit()?;
        appt.version += 1;

        tracing::info!(
            appointment_id = %appt.id,
            record_id = %record.id,
            %from,
            to = %appt.status,
            user_id = %actor.user_id,
            "Appointment completed"
        );

        self.notify(
            appt.patient_id,
            &appt,
            NotificationKind::Completed,
            format!("Your visit on {} is complete; your record is available", Self::slot_label(&appt)),
        );
        Ok(appt)
    }

    /// Move to another slot in the same doctor's schedule. The old slot is
    /// released by the status/slot change itself.
    pub fn reschedule(
        &self,
        id: &Uuid,
        actor: &Actor,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Appointment, LifecycleError> {
        let mut appt = self.load(id)?;
        self.require(actor, &appt, Capability::Participant, "reschedule")?;
        ensure_transition(appt.status, AppointmentStatus::Rescheduled)?;
        let slot = validate_slot(self.conn, &appt.doctor_id, &date, &start, &end, Some(&appt.id))?;

        let reason = format!("Moved from {}", Self::slot_label(&appt));
        let from = appt.status;
        appt.appointment_date = date;
        appt.time_slot = slot;
        appt.status = AppointmentStatus::Rescheduled;
        appt.reminder_sent_at = None;
        appt.updated_at = now_utc();
        self.commit(actor, from, &mut appt, Some(&reason))?;

        self.notify_others(
            actor,
            &appt,
            NotificationKind::Rescheduled,
            format!("Appointment moved to {}", Self::slot_label(&appt)),
        );
        Ok(appt)
    }

    /// confirmed → no-show, once the appointment date has arrived.
    pub fn mark_no_show(&self, id: &Uuid, actor: &Actor) -> Result<Appointment, LifecycleError> {
        let mut appt = self.load(id)?;
        self.require(actor, &appt, Capability::AssignedDoctor, "mark no-show on")?;
        ensure_transition(appt.status, AppointmentStatus::NoShow)?;
        if appt.appointment_date > Utc::now().date_naive() {
            return Err(LifecycleError::InvalidInput(
                "Cannot mark a future appointment as no-show".into(),
            ));
        }

        let from = appt.status;
        appt.status = AppointmentStatus::NoShow;
        appt.updated_at = now_utc();
        self.commit(actor, from, &mut appt, None)?;

        self.notify(
            appt.patient_id,
            &appt,
            NotificationKind::NoShow,
            format!("You missed your appointment on {}", Self::slot_label(&appt)),
        );
        Ok(appt)
    }

    // ── queries ────────────────────────────────────────────

    pub fn get_appointment(&self, id: &Uuid, actor: &Actor) -> Result<Appointment, LifecycleError> {
        let appt = self.load(id)?;
        self.require(actor, &appt, Capability::Participant, "view")?;
        Ok(appt)
    }

    /// Look up the appointment a booking code was issued for.
    pub fn find_by_booking_code(&self, code: &str, actor: &Actor) -> Result<Appointment, LifecycleError> {
        let code = code.trim();
        let appt = db::get_appointment_by_booking_code(self.conn, code)?
            .ok_or_else(|| LifecycleError::not_found("Appointment", code))?;
        self.require(actor, &appt, Capability::Participant, "view")?;
        Ok(appt)
    }

    /// Patients see their own, doctors their own schedule, admins everything.
    pub fn list_for_actor(&self, actor: &Actor) -> Result<Vec<Appointment>, LifecycleError> {
        let appointments = match actor.role {
            Role::Patient => db::list_appointments_for_patient(self.conn, &actor.user_id)?,
            Role::Doctor { doctor_id } => db::list_appointments_for_doctor(self.conn, &doctor_id)?,
            Role::Admin => db::list_all_appointments(self.conn)?,
        };
        Ok(appointments)
    }

    pub fn events(&self, id: &Uuid, actor: &Actor) -> Result<Vec<AppointmentEvent>, LifecycleError> {
        let appt = self.get_appointment(id, actor)?;
        Ok(db::list_appointment_events(self.conn, &appt.id)?)
    }
}
