use rusqlite::{params, Connection};

use crate::db::{format_timestamp, now_utc, DatabaseError};

/// Record one API access.
pub fn insert_audit_entry(
    conn: &Connection,
    user_id: Option<&str>,
    action: &str,
    outcome: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (timestamp, user_id, action, outcome) VALUES (?1, ?2, ?3, ?4)",
        params![format_timestamp(&now_utc()), user_id, action, outcome],
    )?;
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let cutoff = now_utc() - chrono::Duration::days(retention_days);
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < ?1",
        params![format_timestamp(&cutoff)],
    )?;
    Ok(deleted)
}

/// Audit entries for one user, newest first, as (timestamp, action, outcome).
pub fn query_audit_by_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<(String, String, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, outcome FROM audit_log
         WHERE user_id = ?1 ORDER BY id DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
