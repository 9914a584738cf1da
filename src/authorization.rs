//! Caller identity and per-appointment authorization.
//!
//! A session resolves once to an `Actor` carrying a `Role`. Doctor accounts
//! resolve to the `doctors` row whose `user_id` is the session user. Each
//! lifecycle operation names the `Capability` it needs and `authorize`
//! checks it against the appointment, default-deny:
//! 1. Assigned doctor (`actor.doctor_id == appointment.doctor_id`)
//! 2. Patient (`actor.user_id == appointment.patient_id`)
//! 3. Admin, where the capability admits admins
//! 4. Default → DENY

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{Appointment, User, UserRole};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Role resolved at authentication time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Patient,
    Doctor { doctor_id: Uuid },
    Admin,
}

/// The authenticated caller, carried through the request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn doctor_id(&self) -> Option<Uuid> {
        match self.role {
            Role::Doctor { doctor_id } => Some(doctor_id),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_patient_of(&self, appt: &Appointment) -> bool {
        self.role == Role::Patient && self.user_id == appt.patient_id
    }

    pub fn is_doctor_of(&self, appt: &Appointment) -> bool {
        self.doctor_id() == Some(appt.doctor_id)
    }
}

/// What an operation requires of its caller relative to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Only the doctor the appointment is booked with.
    AssignedDoctor,
    /// The assigned doctor or an admin.
    ClinicalEditor,
    /// The patient, the assigned doctor, or an admin.
    Participant,
}

/// Why access was granted or denied, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    AssignedDoctor,
    Patient,
    Admin,
    Denied,
}

impl AccessReason {
    pub fn allowed(self) -> bool {
        self != AccessReason::Denied
    }
}

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Doctor account {0} has no doctor profile")]
    DoctorProfileMissing(Uuid),
}

// ═══════════════════════════════════════════════════════════
// Resolution and checks
// ═══════════════════════════════════════════════════════════

/// Build the `Actor` for an authenticated user.
pub fn resolve_actor(conn: &Connection, user: &User) -> Result<Actor, AuthorizationError> {
    let role = match user.role {
        UserRole::Patient => Role::Patient,
        UserRole::Admin => Role::Admin,
        UserRole::Doctor => {
            let doctor = db::get_doctor_by_user(conn, &user.id)?
                .ok_or(AuthorizationError::DoctorProfileMissing(user.id))?;
            Role::Doctor { doctor_id: doctor.id }
        }
    };

    Ok(Actor {
        user_id: user.id,
        name: user.name.clone(),
        role,
    })
}

/// Check `actor` against `appt` for the given capability.
pub fn authorize(actor: &Actor, appt: &Appointment, capability: Capability) -> AccessReason {
    // Rule 1: assigned doctor satisfies every capability
    if actor.is_doctor_of(appt) {
        return AccessReason::AssignedDoctor;
    }

    match capability {
        Capability::AssignedDoctor => AccessReason::Denied,
        Capability::ClinicalEditor => {
            if actor.is_admin() {
                AccessReason::Admin
            } else {
                AccessReason::Denied
            }
        }
        Capability::Participant => {
            // Rule 2: own appointment
            if actor.is_patient_of(appt) {
                AccessReason::Patient
            // Rule 3: admin
            } else if actor.is_admin() {
                AccessReason::Admin
            } else {
                AccessReason::Denied
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use crate::test_support::{future_date, insert_appointment_with, seed};

    #[test]
    fn doctor_account_resolves_doctor_id() {
        let fx = seed();
        let actor = resolve_actor(&fx.conn, &fx.doctor_user).unwrap();
        assert_eq!(actor.role, Role::Doctor { doctor_id: fx.doctor.id });
        assert_eq!(actor.doctor_id(), Some(fx.doctor.id));
    }

    #[test]
    fn doctor_account_without_profile_is_error() {
        let fx = seed();
        let mut orphan = fx.patient.clone();
        orphan.role = UserRole::Doctor;
        let err = resolve_actor(&fx.conn, &orphan).unwrap_err();
        assert!(matches!(err, AuthorizationError::DoctorProfileMissing(_)));
    }

    #[test]
    fn assigned_doctor_passes_every_capability() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(2), 9);
        let doctor = resolve_actor(&fx.conn, &fx.doctor_user).unwrap();
        for cap in [Capability::AssignedDoctor, Capability::ClinicalEditor, Capability::Participant] {
            assert_eq!(authorize(&doctor, &appt, cap), AccessReason::AssignedDoctor);
        }
    }

    #[test]
    fn other_doctor_is_denied() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(2), 9);
        let other = resolve_actor(&fx.conn, &fx.other_doctor_user).unwrap();
        for cap in [Capability::AssignedDoctor, Capability::ClinicalEditor, Capability::Participant] {
            assert!(!authorize(&other, &appt, cap).allowed());
        }
    }

    #[test]
    fn patient_is_participant_but_not_clinician() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(2), 9);
        let patient = resolve_actor(&fx.conn, &fx.patient).unwrap();
        assert_eq!(authorize(&patient, &appt, Capability::Participant), AccessReason::Patient);
        assert_eq!(authorize(&patient, &appt, Capability::AssignedDoctor), AccessReason::Denied);
        assert_eq!(authorize(&patient, &appt, Capability::ClinicalEditor), AccessReason::Denied);
    }

    #[test]
    fn stranger_patient_is_denied() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(2), 9);
        let stranger = resolve_actor(&fx.conn, &fx.other_patient).unwrap();
        assert_eq!(authorize(&stranger, &appt, Capability::Participant), AccessReason::Denied);
    }

    #[test]
    fn admin_edits_records_but_cannot_act_as_doctor() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(2), 9);
        let admin = resolve_actor(&fx.conn, &fx.admin).unwrap();
        assert_eq!(authorize(&admin, &appt, Capability::ClinicalEditor), AccessReason::Admin);
        assert_eq!(authorize(&admin, &appt, Capability::Participant), AccessReason::Admin);
        assert_eq!(authorize(&admin, &appt, Capability::AssignedDoctor), AccessReason::Denied);
    }
}
