//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a plain `&Connection` so callers can pass either a
//! connection or an open `Transaction` (which derefs to one).

mod appointment;
mod audit;
mod consistency;
mod doctor;
mod hospital;
mod medical_record;
mod schedule;
mod session;
mod user;

pub use appointment::*;
pub use audit::*;
pub use consistency::*;
pub use doctor::*;
pub use hospital::*;
pub use medical_record::*;
pub use schedule::*;
pub use session::*;
pub use user::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now_utc, DatabaseError};
    use crate::models::*;
    use crate::test_support::{future_date, insert_appointment_with, seed};
    use chrono::{Duration, NaiveTime};
    use uuid::Uuid;

    #[test]
    fn appointment_insert_and_retrieve() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(3), 9);
        let loaded = get_appointment(&fx.conn, &appt.id).unwrap().unwrap();
        assert_eq!(loaded.status, AppointmentStatus::Pending);
        assert_eq!(loaded.booking_code, appt.booking_code);
        assert_eq!(loaded.time_slot, appt.time_slot);
        assert_eq!(loaded.version, 0);
        assert!(loaded.medical_record.is_none());

        let by_code = get_appointment_by_booking_code(&fx.conn, &appt.booking_code)
            .unwrap()
            .unwrap();
        assert_eq!(by_code.id, appt.id);
    }

    #[test]
    fn missing_appointment_is_none() {
        let fx = seed();
        assert!(get_appointment(&fx.conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn versioned_update_rejects_stale_version() {
        let fx = seed();
        let mut appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(3), 9);

        appt.status = AppointmentStatus::Confirmed;
        assert!(update_appointment_versioned(&fx.conn, &appt).unwrap());

        // Same stale version again: another writer already bumped it
        appt.status = AppointmentStatus::Cancelled;
        assert!(!update_appointment_versioned(&fx.conn, &appt).unwrap());

        let stored = get_appointment(&fx.conn, &appt.id).unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Confirmed);
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn held_slot_blocks_second_booking_at_storage_level() {
        let fx = seed();
        let date = future_date(3);
        insert_appointment_with(&fx, AppointmentStatus::Pending, date, 9);

        let mut clash = crate::test_support::appointment_template(&fx, date, 9);
        clash.booking_code = "BK-CLASH".into();
        let err = insert_appointment(&fx.conn, &clash).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn released_slot_can_be_rebooked() {
        let fx = seed();
        let date = future_date(3);
        insert_appointment_with(&fx, AppointmentStatus::Cancelled, date, 9);

        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(!is_doctor_slot_held(&fx.conn, &fx.doctor.id, &date, &start, None).unwrap());
        insert_appointment_with(&fx, AppointmentStatus::Pending, date, 9);
        assert!(is_doctor_slot_held(&fx.conn, &fx.doctor.id, &date, &start, None).unwrap());
        assert_eq!(held_start_times(&fx.conn, &fx.doctor.id, &date).unwrap(), vec![start]);
    }

    #[test]
    fn slot_held_check_can_exclude_self() {
        let fx = seed();
        let date = future_date(3);
        let appt = insert_appointment_with(&fx, AppointmentStatus::Confirmed, date, 9);
        let start = appt.time_slot.start_time;
        assert!(!is_doctor_slot_held(&fx.conn, &fx.doctor.id, &date, &start, Some(&appt.id)).unwrap());
        let room = appt.time_slot.room_id.unwrap();
        assert!(is_room_slot_held(&fx.conn, &room, &date, &start, None).unwrap());
    }

    #[test]
    fn one_medical_record_per_appointment() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Completed, future_date(1), 9);
        let now = now_utc();
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: fx.patient.id,
            doctor_id: fx.doctor.id,
            appointment_id: Some(appt.id),
            diagnosis: "Flu".into(),
            treatment: None,
            prescription: vec![],
            notes: None,
            created_at: now,
            updated_at: now,
        };
        insert_medical_record(&fx.conn, &record).unwrap();

        let duplicate = MedicalRecord { id: Uuid::new_v4(), ..record.clone() };
        let err = insert_medical_record(&fx.conn, &duplicate).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert_eq!(count_medical_records_for_appointment(&fx.conn, &appt.id).unwrap(), 1);

        // Standalone records (no appointment) are not limited
        let standalone_a = MedicalRecord { id: Uuid::new_v4(), appointment_id: None, ..record.clone() };
        let standalone_b = MedicalRecord { id: Uuid::new_v4(), appointment_id: None, ..record };
        insert_medical_record(&fx.conn, &standalone_a).unwrap();
        insert_medical_record(&fx.conn, &standalone_b).unwrap();
        assert_eq!(list_medical_records_for_patient(&fx.conn, &fx.patient.id).unwrap().len(), 3);
    }

    #[test]
    fn prescription_order_survives_storage() {
        let fx = seed();
        let now = now_utc();
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: fx.patient.id,
            doctor_id: fx.doctor.id,
            appointment_id: None,
            diagnosis: "Hypertension".into(),
            treatment: Some("Diet".into()),
            prescription: vec![
                PrescriptionItem {
                    medicine: "Lisinopril".into(),
                    dosage: Some("10mg".into()),
                    frequency: None,
                    duration: None,
                    notes: None,
                },
                PrescriptionItem {
                    medicine: "Amlodipine".into(),
                    dosage: Some("5mg".into()),
                    frequency: Some("daily".into()),
                    duration: None,
                    notes: None,
                },
            ],
            notes: None,
            created_at: now,
            updated_at: now,
        };
        insert_medical_record(&fx.conn, &record).unwrap();
        let loaded = get_medical_record(&fx.conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded.prescription, record.prescription);
        assert_eq!(loaded.created_at, now);
    }

    #[test]
    fn session_lookup_honours_expiry() {
        let fx = seed();
        let now = now_utc();
        insert_session(&fx.conn, "live", &fx.patient.id, &now, &(now + Duration::hours(1))).unwrap();
        insert_session(&fx.conn, "stale", &fx.patient.id, &now, &(now - Duration::hours(1))).unwrap();

        assert_eq!(find_session_user(&fx.conn, "live", &now).unwrap(), Some(fx.patient.id));
        assert_eq!(find_session_user(&fx.conn, "stale", &now).unwrap(), None);
        assert_eq!(prune_expired_sessions(&fx.conn, &now).unwrap(), 1);
        assert!(delete_session(&fx.conn, "live").unwrap());
        assert_eq!(find_session_user(&fx.conn, "live", &now).unwrap(), None);
    }

    #[test]
    fn doctor_resolves_from_user_account() {
        let fx = seed();
        let doctor = get_doctor_by_user(&fx.conn, &fx.doctor_user.id).unwrap().unwrap();
        assert_eq!(doctor.id, fx.doctor.id);
        assert!(get_doctor_by_user(&fx.conn, &fx.patient.id).unwrap().is_none());
    }

    #[test]
    fn user_email_lookup_is_case_insensitive() {
        let fx = seed();
        let upper = fx.patient.email.to_uppercase();
        let found = get_user_by_email(&fx.conn, &upper).unwrap().unwrap();
        assert_eq!(found.id, fx.patient.id);
    }

    #[test]
    fn events_are_listed_in_insertion_order() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(2), 10);
        for (from, to) in [
            (None, AppointmentStatus::Pending),
            (Some(AppointmentStatus::Pending), AppointmentStatus::Confirmed),
        ] {
            insert_appointment_event(&fx.conn, &AppointmentEvent {
                appointment_id: appt.id,
                from_status: from,
                to_status: to,
                actor_user_id: fx.doctor_user.id,
                reason: None,
                at: now_utc(),
            })
            .unwrap();
        }
        let events = list_appointment_events(&fx.conn, &appt.id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].from_status, None);
        assert_eq!(events[1].to_status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn reminder_query_skips_reminded_and_released() {
        let fx = seed();
        let date = future_date(1);
        let due = insert_appointment_with(&fx, AppointmentStatus::Confirmed, date, 9);
        insert_appointment_with(&fx, AppointmentStatus::Cancelled, date, 10);
        let reminded = insert_appointment_with(&fx, AppointmentStatus::Pending, date, 11);
        mark_reminder_sent(&fx.conn, &reminded.id, &now_utc()).unwrap();

        let list = list_due_for_reminder(&fx.conn, &date).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, due.id);
    }

    #[test]
    fn consistency_detects_and_repairs_drift() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Completed, future_date(1), 9);
        let now = now_utc();
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: fx.patient.id,
            doctor_id: fx.doctor.id,
            appointment_id: Some(appt.id),
            diagnosis: "Flu".into(),
            treatment: None,
            prescription: vec![],
            notes: None,
            created_at: now,
            updated_at: now,
        };
        insert_medical_record(&fx.conn, &record).unwrap();

        let report = check_consistency(&fx.conn).unwrap();
        assert_eq!(report.appointments_checked, 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].category, "snapshot_drift");

        assert_eq!(repair_consistency(&fx.conn).unwrap(), 1);
        assert!(check_consistency(&fx.conn).unwrap().issues.is_empty());
        let healed = get_appointment(&fx.conn, &appt.id).unwrap().unwrap();
        assert_eq!(healed.medical_record.unwrap().diagnosis, "Flu");
    }

    #[test]
    fn consistency_restores_record_from_snapshot() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Completed, future_date(1), 9);
        let now = now_utc();
        let snapshot = MedicalRecordSnapshot {
            record_id: Uuid::new_v4(),
            diagnosis: "Migraine".into(),
            treatment: None,
            prescription: vec![],
            notes: None,
            created_at: now,
            updated_at: now,
        };
        set_medical_record_snapshot(&fx.conn, &appt.id, Some(&snapshot)).unwrap();

        let report = check_consistency(&fx.conn).unwrap();
        assert_eq!(report.issues[0].category, "missing_record");

        assert_eq!(repair_consistency(&fx.conn).unwrap(), 1);
        let record = get_medical_record_by_appointment(&fx.conn, &appt.id).unwrap().unwrap();
        assert_eq!(record.id, snapshot.record_id);
        assert_eq!(record.diagnosis, "Migraine");
    }

    #[test]
    fn consistency_reports_orphaned_record() {
        let fx = seed();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Confirmed, future_date(1), 9);
        let now = now_utc();
        insert_medical_record(&fx.conn, &MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: fx.patient.id,
            doctor_id: fx.doctor.id,
            appointment_id: Some(appt.id),
            diagnosis: "Flu".into(),
            treatment: None,
            prescription: vec![],
            notes: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();

        let report = check_consistency(&fx.conn).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].category, "orphaned_record");
        assert_eq!(repair_consistency(&fx.conn).unwrap(), 0);
    }

    #[test]
    fn audit_entries_are_queryable_by_user() {
        let fx = seed();
        let user = fx.patient.id.to_string();
        insert_audit_entry(&fx.conn, Some(&user), "GET /api/appointments", "status:200").unwrap();
        insert_audit_entry(&fx.conn, None, "POST /api/auth/login", "status:401").unwrap();
        let rows = query_audit_by_user(&fx.conn, &user).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "GET /api/appointments");
        assert_eq!(prune_audit_log(&fx.conn, 90).unwrap(), 0);
    }
}
