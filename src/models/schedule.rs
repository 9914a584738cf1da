use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of a doctor's recurring weekly schedule.
/// `weekday` counts from Monday = 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorTimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub weekday: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room_id: Option<Uuid>,
}

/// A concrete slot on an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room_id: Option<Uuid>,
}
