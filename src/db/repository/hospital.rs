use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};
use crate::models::*;

pub fn insert_hospital(conn: &Connection, hospital: &Hospital) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO hospitals (id, name, address) VALUES (?1, ?2, ?3)",
        params![hospital.id.to_string(), hospital.name, hospital.address],
    )?;
    Ok(())
}

pub fn get_hospital(conn: &Connection, id: &Uuid) -> Result<Option<Hospital>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, address FROM hospitals WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, name, address)| {
        Ok(Hospital {
            id: parse_uuid("hospitals.id", &id)?,
            name,
            address,
        })
    })
    .transpose()
}

pub fn insert_specialty(conn: &Connection, specialty: &Specialty) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO specialties (id, name) VALUES (?1, ?2)",
        params![specialty.id.to_string(), specialty.name],
    )?;
    Ok(())
}

pub fn insert_service(conn: &Connection, service: &Service) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO services (id, hospital_id, name) VALUES (?1, ?2, ?3)",
        params![
            service.id.to_string(),
            service.hospital_id.to_string(),
            service.name,
        ],
    )?;
    Ok(())
}

pub fn insert_room(conn: &Connection, room: &Room) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO rooms (id, hospital_id, name) VALUES (?1, ?2, ?3)",
        params![room.id.to_string(), room.hospital_id.to_string(), room.name],
    )?;
    Ok(())
}
