use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{format_timestamp, parse_timestamp, parse_uuid, DatabaseError};
use crate::models::*;

/// Password material as stored: base64 PBKDF2 output and base64 salt.
#[derive(Debug, Clone)]
pub struct StoredPassword {
    pub hash: String,
    pub salt: String,
}

pub fn insert_user(
    conn: &Connection,
    user: &User,
    password: Option<&StoredPassword>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, email, name, role, password_hash, password_salt, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.email.to_lowercase(),
            user.name,
            user.role.as_str(),
            password.map(|p| p.hash.clone()),
            password.map(|p| p.salt.clone()),
            user.phone,
            format_timestamp(&user.created_at),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

const USER_COLUMNS: &str = "id, email, name, role, phone, created_at";

struct UserRow {
    id: String,
    email: String,
    name: String,
    role: String,
    phone: Option<String>,
    created_at: String,
}

fn user_row_from_rusqlite(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        phone: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: parse_uuid("users.id", &row.id)?,
        email: row.email,
        name: row.name,
        role: UserRole::from_str(&row.role)?,
        phone: row.phone,
        created_at: parse_timestamp("users.created_at", &row.created_at)?,
    })
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            user_row_from_rusqlite,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email.trim().to_lowercase()],
            user_row_from_rusqlite,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

/// Fetch a user together with stored password material, if any.
pub fn get_user_with_password(
    conn: &Connection,
    email: &str,
) -> Result<Option<(User, Option<StoredPassword>)>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS}, password_hash, password_salt FROM users WHERE email = ?1"
            ),
            params![email.trim().to_lowercase()],
            |row| {
                Ok((
                    user_row_from_rusqlite(row)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((user_row, hash, salt)) => {
            let user = user_from_row(user_row)?;
            let password = match (hash, salt) {
                (Some(hash), Some(salt)) => Some(StoredPassword { hash, salt }),
                _ => None,
            };
            Ok(Some((user, password)))
        }
        None => Ok(None),
    }
}

pub fn set_user_password(
    conn: &Connection,
    user_id: &Uuid,
    password: &StoredPassword,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET password_hash = ?1, password_salt = ?2 WHERE id = ?3",
        params![password.hash, password.salt, user_id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: user_id.to_string(),
        });
    }
    Ok(())
}
