//! Medical records and the snapshot embedded on completed appointments.
//!
//! `medical_records` is canonical. The appointment's `medical_record`
//! column is always `MedicalRecordSnapshot::from(&record)` and is written
//! in the same transaction as the record it mirrors.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{authorize, Actor, Capability, Role};
use crate::db::{self, now_utc};
use crate::models::*;

use super::{Lifecycle, LifecycleError};

/// Trim and check a clinical payload. Diagnosis and every medicine name
/// must be non-blank.
pub fn validate_clinical_data(data: &ClinicalData) -> Result<ClinicalData, LifecycleError> {
    let diagnosis = data.diagnosis.trim();
    if diagnosis.is_empty() {
        return Err(LifecycleError::InvalidInput("Diagnosis is required".into()));
    }

    let mut prescription = Vec::with_capacity(data.prescription.len());
    for (i, item) in data.prescription.iter().enumerate() {
        let medicine = item.medicine.trim();
        if medicine.is_empty() {
            return Err(LifecycleError::InvalidInput(format!(
                "Prescription item {} has no medicine",
                i + 1
            )));
        }
        prescription.push(PrescriptionItem {
            medicine: medicine.to_string(),
            ..item.clone()
        });
    }

    Ok(ClinicalData {
        diagnosis: diagnosis.to_string(),
        treatment: non_blank(&data.treatment),
        prescription,
        notes: non_blank(&data.notes),
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Insert or update the record for `appt`. Must run inside the caller's
/// transaction.
pub(crate) fn upsert_for_appointment(
    conn: &Connection,
    appt: &Appointment,
    data: &ClinicalData,
    now: DateTime<Utc>,
) -> Result<MedicalRecord, LifecycleError> {
    match db::get_medical_record_by_appointment(conn, &appt.id)? {
        Some(mut record) => {
            record.diagnosis = data.diagnosis.clone();
            record.treatment = data.treatment.clone();
            record.prescription = data.prescription.clone();
            record.notes = data.notes.clone();
            record.updated_at = now;
            db::update_medical_record_fields(conn, &record)?;
            Ok(record)
        }
        None => {
            let record = MedicalRecord {
                id: Uuid::new_v4(),
                patient_id: appt.patient_id,
                doctor_id: appt.doctor_id,
                appointment_id: Some(appt.id),
                diagnosis: data.diagnosis.clone(),
                treatment: data.treatment.clone(),
                prescription: data.prescription.clone(),
                notes: data.notes.clone(),
                created_at: now,
                updated_at: now,
            };
            db::insert_medical_record(conn, &record)?;
            Ok(record)
        }
    }
}

/// Rewrite the appointment's snapshot from its canonical record.
/// Returns `false` when the appointment has no record. Idempotent.
pub fn rebuild_snapshot(conn: &Connection, appointment_id: &Uuid) -> Result<bool, LifecycleError> {
    match db::get_medical_record_by_appointment(conn, appointment_id)? {
        Some(record) => {
            db::set_medical_record_snapshot(
                conn,
                appointment_id,
                Some(&MedicalRecordSnapshot::from(&record)),
            )?;
            Ok(true)
        }
        None => Ok(false),
    }
}

impl Lifecycle<'_> {
    /// The record written when the appointment was completed.
    pub fn get_record_for_appointment(
        &self,
        appointment_id: &Uuid,
        actor: &Actor,
    ) -> Result<MedicalRecord, LifecycleError> {
        let appt = self.load(appointment_id)?;
        self.require(actor, &appt, Capability::Participant, "view")?;
        db::get_medical_record_by_appointment(self.conn, appointment_id)?
            .ok_or_else(|| LifecycleError::not_found("MedicalRecord", appointment_id))
    }

    /// A patient's records, newest first. Visible to the patient, to any
    /// doctor who has an appointment with them, and to admins.
    pub fn list_patient_records(
        &self,
        patient_id: &Uuid,
        actor: &Actor,
    ) -> Result<Vec<MedicalRecord>, LifecycleError> {
        let patient = db::get_user(self.conn, patient_id)?
            .filter(|u| u.role == UserRole::Patient)
            .ok_or_else(|| LifecycleError::not_found("Patient", patient_id))?;

        let allowed = match actor.role {
            Role::Admin => true,
            Role::Patient => actor.user_id == patient.id,
            Role::Doctor { doctor_id } => db::list_appointments_for_patient(self.conn, &patient.id)?
                .iter()
                .any(|a| a.doctor_id == doctor_id),
        };
        if !allowed {
            tracing::warn!(user_id = %actor.user_id, %patient_id, "Denied medical record listing");
            return Err(LifecycleError::Forbidden(
                "Not allowed to view this patient's records".into(),
            ));
        }

        Ok(db::list_medical_records_for_patient(self.conn, &patient.id)?)
    }

    /// Edit a record's clinical fields. The linked appointment's snapshot
    /// is refreshed in the same transaction.
    pub fn update_medical_record(
        &self,
        record_id: &Uuid,
        actor: &Actor,
        data: &ClinicalData,
    ) -> Result<MedicalRecord, LifecycleError> {
        let mut record = db::get_medical_record(self.conn, record_id)?
            .ok_or_else(|| LifecycleError::not_found("MedicalRecord", record_id))?;

        let allowed = match &record.appointment_id {
            Some(appointment_id) => {
                let appt = self.load(appointment_id)?;
                authorize(actor, &appt, Capability::ClinicalEditor).allowed()
            }
            None => actor.is_admin() || actor.doctor_id() == Some(record.doctor_id),
        };
        if !allowed {
            return Err(LifecycleError::Forbidden(
                "Only the record's doctor or an admin may edit it".into(),
            ));
        }
        let data = validate_clinical_data(data)?;

        record.diagnosis = data.diagnosis;
        record.treatment = data.treatment;
        record.prescription = data.prescription;
        record.notes = data.notes;
        record.updated_at = now_utc();

        let tx = self.conn.unchecked_transaction()?;
        db::update_medical_record_fields(&tx, &record)?;
        if let Some(appointment_id) = &record.appointment_id {
            rebuild_snapshot(&tx, appointment_id)?;
        }
        tx.commit()?;

        tracing::info!(record_id = %record.id, user_id = %actor.user_id, "Medical record updated");
        Ok(record)
    }

    /// A record not tied to any appointment. Doctors author as themselves;
    /// admins must name the doctor.
    pub fn create_standalone_record(
        &self,
        actor: &Actor,
        patient_id: &Uuid,
        doctor_id: Option<Uuid>,
        data: &ClinicalData,
    ) -> Result<MedicalRecord, LifecycleError> {
        let doctor_id = match actor.role {
            Role::Doctor { doctor_id } => doctor_id,
            Role::Admin => doctor_id.ok_or_else(|| {
                LifecycleError::InvalidInput("doctor_id is required when an admin creates a record".into())
            })?,
            Role::Patient => {
                return Err(LifecycleError::Forbidden(
                    "Only doctors and admins may create medical records".into(),
                ))
            }
        };

        db::get_user(self.conn, patient_id)?
            .filter(|u| u.role == UserRole::Patient)
            .ok_or_else(|| LifecycleError::not_found("Patient", patient_id))?;
        db::get_doctor(self.conn, &doctor_id)?
            .ok_or_else(|| LifecycleError::not_found("Doctor", doctor_id))?;
        let data = validate_clinical_data(data)?;

        let now = now_utc();
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: *patient_id,
            doctor_id,
            appointment_id: None,
            diagnosis: data.diagnosis,
            treatment: data.treatment,
            prescription: data.prescription,
            notes: data.notes,
            created_at: now,
            updated_at: now,
        };
        db::insert_medical_record(self.conn, &record)?;

        tracing::info!(record_id = %record.id, %patient_id, "Standalone medical record created");
        Ok(record)
    }
}
