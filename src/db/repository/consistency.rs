use rusqlite::Connection;
use uuid::Uuid;

use super::appointment::{get_appointment, set_medical_record_snapshot};
use super::medical_record::{get_medical_record_by_appointment, insert_medical_record};
use crate::db::{parse_uuid, DatabaseError};
use crate::models::{MedicalRecord, MedicalRecordSnapshot};

/// A single consistency issue detected by the checker.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsistencyIssue {
    pub category: String,
    pub severity: String,
    pub description: String,
    pub appointment_id: Option<String>,
}

/// Result of a consistency check between appointments and medical records.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsistencyReport {
    pub issues: Vec<ConsistencyIssue>,
    pub appointments_checked: i64,
}

fn completed_appointment_ids(conn: &Connection) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id FROM appointments WHERE status = 'completed'")?;
    let ids: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter()
        .map(|id| parse_uuid("appointments.id", id))
        .collect()
}

/// Run a full consistency check across appointments and medical records.
///
/// Detects:
/// - Completed appointments with no canonical medical record
/// - Completed appointments whose embedded snapshot differs from the record
/// - Records attached to appointments that are not completed
pub fn check_consistency(conn: &Connection) -> Result<ConsistencyReport, DatabaseError> {
    let mut issues = Vec::new();
    let completed = completed_appointment_ids(conn)?;

    for id in &completed {
        let Some(appt) = get_appointment(conn, id)? else {
            continue;
        };
        match get_medical_record_by_appointment(conn, id)? {
            None => issues.push(ConsistencyIssue {
                category: "missing_record".into(),
                severity: "high".into(),
                description: "Completed appointment has no medical record".into(),
                appointment_id: Some(id.to_string()),
            }),
            Some(record) => {
                let expected = MedicalRecordSnapshot::from(&record);
                if appt.medical_record.as_ref() != Some(&expected) {
                    issues.push(ConsistencyIssue {
                        category: "snapshot_drift".into(),
                        severity: "medium".into(),
                        description: "Embedded snapshot differs from medical record".into(),
                        appointment_id: Some(id.to_string()),
                    });
                }
            }
        }
    }

    let mut stmt = conn.prepare(
        "SELECT mr.appointment_id, a.status FROM medical_records mr
         JOIN appointments a ON a.id = mr.appointment_id
         WHERE a.status != 'completed'",
    )?;
    let orphaned: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    for (appointment_id, status) in orphaned {
        issues.push(ConsistencyIssue {
            category: "orphaned_record".into(),
            severity: "medium".into(),
            description: format!("Medical record attached to '{status}' appointment"),
            appointment_id: Some(appointment_id),
        });
    }

    Ok(ConsistencyReport {
        issues,
        appointments_checked: completed.len() as i64,
    })
}

/// Auto-repair consistency issues that can be safely fixed.
///
/// Currently repairs:
/// - Snapshot drift -> snapshot rebuilt from the medical record
/// - Missing record with a surviving snapshot -> record restored from it
///
/// Orphaned records are reported only. Returns the number of repairs.
pub fn repair_consistency(conn: &Connection) -> Result<usize, DatabaseError> {
    let mut repaired = 0;
    let tx = conn.unchecked_transaction()?;

    for id in completed_appointment_ids(&tx)? {
        let Some(appt) = get_appointment(&tx, &id)? else {
            continue;
        };
        match get_medical_record_by_appointment(&tx, &id)? {
            Some(record) => {
                let expected = MedicalRecordSnapshot::from(&record);
                if appt.medical_record.as_ref() != Some(&expected) {
                    set_medical_record_snapshot(&tx, &id, Some(&expected))?;
                    tracing::info!(appointment_id = %id, "Rebuilt drifted medical record snapshot");
                    repaired += 1;
                }
            }
            None => {
                if let Some(snapshot) = appt.medical_record {
                    let record = MedicalRecord {
                        id: snapshot.record_id,
                        patient_id: appt.patient_id,
                        doctor_id: appt.doctor_id,
                        appointment_id: Some(appt.id),
                        diagnosis: snapshot.diagnosis,
                        treatment: snapshot.treatment,
                        prescription: snapshot.prescription,
                        notes: snapshot.notes,
                        created_at: snapshot.created_at,
                        updated_at: snapshot.updated_at,
                    };
                    insert_medical_record(&tx, &record)?;
                    tracing::info!(appointment_id = %id, "Restored medical record from snapshot");
                    repaired += 1;
                } else {
                    tracing::warn!(appointment_id = %id, "Completed appointment has no clinical data to restore");
                }
            }
        }
    }

    tx.commit()?;
    Ok(repaired)
}
