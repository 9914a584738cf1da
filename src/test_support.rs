//! Shared fixtures for unit tests: a seeded in-memory database with one
//! hospital, two patients, two doctors (each with a weekly schedule) and an admin.

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, now_utc};
use crate::models::*;

pub struct Fixture {
    pub conn: Connection,
    pub hospital: Hospital,
    pub room: Room,
    pub patient: User,
    pub other_patient: User,
    pub doctor_user: User,
    pub doctor: Doctor,
    pub other_doctor_user: User,
    pub other_doctor: Doctor,
    pub admin: User,
}

/// Hours (start of a one-hour slot) every doctor works, every day.
pub const SCHEDULE_HOURS: [u32; 3] = [9, 10, 11];

pub fn future_date(days: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(days)
}

pub fn hour(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

fn make_user(conn: &Connection, email: &str, name: &str, role: UserRole) -> User {
    let user = User {
        id: Uuid::new_v4(),
        email: email.into(),
        name: name.into(),
        role,
        phone: None,
        created_at: now_utc(),
    };
    db::insert_user(conn, &user, None).unwrap();
    user
}

fn make_doctor(conn: &Connection, user: &User, hospital: &Hospital, room: &Room) -> Doctor {
    let doctor = Doctor {
        id: Uuid::new_v4(),
        user_id: user.id,
        hospital_id: hospital.id,
        specialty_id: None,
        name: user.name.clone(),
    };
    db::insert_doctor(conn, &doctor).unwrap();

    for weekday in 0..7u8 {
        for h in SCHEDULE_HOURS {
            db::insert_time_slot(conn, &DoctorTimeSlot {
                id: Uuid::new_v4(),
                doctor_id: doctor.id,
                weekday,
                start_time: hour(h),
                end_time: hour(h + 1),
                room_id: Some(room.id),
            })
            .unwrap();
        }
    }
    doctor
}

pub fn seed() -> Fixture {
    seed_into(db::open_memory_database().unwrap())
}

/// Seed an already-migrated connection (e.g. a file database behind `CoreState`).
pub fn seed_into(conn: Connection) -> Fixture {
    let hospital = Hospital {
        id: Uuid::new_v4(),
        name: "St. Mercy".into(),
        address: Some("1 Main St".into()),
    };
    db::insert_hospital(&conn, &hospital).unwrap();

    let room = Room { id: Uuid::new_v4(), hospital_id: hospital.id, name: "Room 1".into() };
    let other_room = Room { id: Uuid::new_v4(), hospital_id: hospital.id, name: "Room 2".into() };
    db::insert_room(&conn, &room).unwrap();
    db::insert_room(&conn, &other_room).unwrap();

    let patient = make_user(&conn, "pat@example.com", "Pat Patient", UserRole::Patient);
    let other_patient = make_user(&conn, "sam@example.com", "Sam Stranger", UserRole::Patient);
    let doctor_user = make_user(&conn, "dana@example.com", "Dr. Dana", UserRole::Doctor);
    let other_doctor_user = make_user(&conn, "lee@example.com", "Dr. Lee", UserRole::Doctor);
    let admin = make_user(&conn, "admin@example.com", "Admin", UserRole::Admin);

    let doctor = make_doctor(&conn, &doctor_user, &hospital, &room);
    let other_doctor = make_doctor(&conn, &other_doctor_user, &hospital, &other_room);

    Fixture {
        conn,
        hospital,
        room,
        patient,
        other_patient,
        doctor_user,
        doctor,
        other_doctor_user,
        other_doctor,
        admin,
    }
}

/// An appointment for the fixture patient with the fixture doctor, not yet stored.
pub fn appointment_template(fx: &Fixture, date: NaiveDate, start_hour: u32) -> Appointment {
    let now = now_utc();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: fx.patient.id,
        doctor_id: fx.doctor.id,
        hospital_id: fx.hospital.id,
        specialty_id: None,
        service_id: None,
        appointment_date: date,
        time_slot: TimeSlot {
            start_time: hour(start_hour),
            end_time: hour(start_hour + 1),
            room_id: Some(fx.room.id),
        },
        status: AppointmentStatus::Pending,
        booking_code: format!("BK-{}", &Uuid::new_v4().simple().to_string()[..8]),
        symptoms: Some("Cough".into()),
        medical_history: None,
        notes: None,
        cancel_reason: None,
        cancelled_at: None,
        completion_date: None,
        medical_record: None,
        version: 0,
        reminder_sent_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn insert_appointment_with(
    fx: &Fixture,
    status: AppointmentStatus,
    date: NaiveDate,
    start_hour: u32,
) -> Appointment {
    let mut appt = appointment_template(fx, date, start_hour);
    appt.status = status;
    db::insert_appointment(&fx.conn, &appt).unwrap();
    appt
}

/// Resolve the `Actor` for a seeded user.
pub fn actor(fx: &Fixture, user: &User) -> crate::authorization::Actor {
    crate::authorization::resolve_actor(&fx.conn, user).unwrap()
}
