use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;
use super::medical_record::MedicalRecordSnapshot;
use super::schedule::TimeSlot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub hospital_id: Uuid,
    pub specialty_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub status: AppointmentStatus,
    pub booking_code: String,
    pub symptoms: Option<String>,
    pub medical_history: Option<String>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub medical_record: Option<MedicalRecordSnapshot>,
    pub version: i64,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of an appointment's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentEvent {
    pub appointment_id: Uuid,
    pub from_status: Option<AppointmentStatus>,
    pub to_status: AppointmentStatus,
    pub actor_user_id: Uuid,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}
