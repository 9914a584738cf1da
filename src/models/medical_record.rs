use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub medicine: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Clinical payload supplied by a doctor when completing an appointment
/// or editing a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalData {
    pub diagnosis: String,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub prescription: Vec<PrescriptionItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Canonical clinical record. At most one per appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub prescription: Vec<PrescriptionItem>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Copy of the clinical fields embedded on the appointment row.
/// Always derived from a `MedicalRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalRecordSnapshot {
    pub record_id: Uuid,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub prescription: Vec<PrescriptionItem>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&MedicalRecord> for MedicalRecordSnapshot {
    fn from(record: &MedicalRecord) -> Self {
        Self {
            record_id: record.id,
            diagnosis: record.diagnosis.clone(),
            treatment: record.treatment.clone(),
            prescription: record.prescription.clone(),
            notes: record.notes.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
