//! Password login and bearer sessions.
//!
//! Tokens are 32 random bytes, URL-safe base64. Only their SHA-256 (hex)
//! is stored. Passwords are PBKDF2-HMAC-SHA256 with a per-user salt.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::authorization::{resolve_actor, Actor, AuthorizationError};
use crate::db::{self, now_utc, DatabaseError, StoredPassword};
use crate::models::{User, UserRole};

#[cfg(not(test))]
pub const PBKDF2_ITERATIONS: u32 = 600_000;
#[cfg(test)]
pub const PBKDF2_ITERATIONS: u32 = 1_000;

pub const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Session is missing or expired")]
    SessionInvalid,
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
}

/// A freshly issued session. `token` is only ever returned here.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

/// SHA-256 of a bearer token, lowercase hex.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn derive(password: &str, salt: &[u8]) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out);
    out
}

pub fn hash_password(password: &str) -> StoredPassword {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);

    let engine = base64::engine::general_purpose::STANDARD;
    StoredPassword {
        hash: engine.encode(derive(password, &salt)),
        salt: engine.encode(salt),
    }
}

pub fn verify_password(password: &str, stored: &StoredPassword) -> bool {
    let engine = base64::engine::general_purpose::STANDARD;
    let (Ok(salt), Ok(expected)) = (engine.decode(&stored.salt), engine.decode(&stored.hash)) else {
        tracing::warn!("Stored password material is not valid base64");
        return false;
    };
    let actual = derive(password, &salt);
    actual.as_slice().ct_eq(expected.as_slice()).unwrap_u8() == 1
}

/// Check credentials and open a session lasting `ttl`.
pub fn login(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl: Duration,
) -> Result<Session, AuthError> {
    let Some((user, Some(stored))) = db::get_user_with_password(conn, email)? else {
        tracing::info!("Login failed: unknown account or no password set");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &stored) {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let now = now_utc();
    let pruned = db::prune_expired_sessions(conn, &now)?;
    if pruned > 0 {
        tracing::debug!(pruned, "Pruned expired sessions");
    }

    let token = generate_token();
    let expires_at = now + ttl;
    db::insert_session(conn, &hash_token(&token), &user.id, &now, &expires_at)?;

    tracing::info!(user_id = %user.id, role = %user.role, "Session opened");
    Ok(Session {
        token,
        user,
        expires_at,
    })
}

/// Drop the session for `token`. Returns whether one existed.
pub fn logout(conn: &Connection, token: &str) -> Result<bool, AuthError> {
    Ok(db::delete_session(conn, &hash_token(token))?)
}

/// Resolve a bearer token to its user and role.
pub fn authenticate(conn: &Connection, token: &str) -> Result<Actor, AuthError> {
    let user_id = db::find_session_user(conn, &hash_token(token), &now_utc())?
        .ok_or(AuthError::SessionInvalid)?;
    let user = db::get_user(conn, &user_id)?.ok_or(AuthError::SessionInvalid)?;
    Ok(resolve_actor(conn, &user)?)
}

/// Ensure an admin account with `email` exists. Creates it with `password`
/// if missing; an existing account is left untouched. Returns whether an
/// account was created.
pub fn bootstrap_admin(conn: &Connection, email: &str, password: &str) -> Result<bool, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword);
    }

    if let Some(existing) = db::get_user_by_email(conn, email)? {
        if existing.role != UserRole::Admin {
            tracing::warn!(user_id = %existing.id, "Bootstrap admin email belongs to a non-admin account");
        }
        return Ok(false);
    }

    let admin = User {
        id: Uuid::new_v4(),
        email: email.trim().to_lowercase(),
        name: "Administrator".into(),
        role: UserRole::Admin,
        phone: None,
        created_at: now_utc(),
    };
    db::insert_user(conn, &admin, Some(&hash_password(password)))?;
    tracing::info!(user_id = %admin.id, "Bootstrap admin account created");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Role;
    use crate::test_support::seed;

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = hash_token("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn generated_tokens_are_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }

    #[test]
    fn password_round_trip() {
        let stored = hash_password("correct horse");
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("correct horsE", &stored));
    }

    #[test]
    fn same_password_gets_different_salt() {
        let a = hash_password("pw123456");
        let b = hash_password("pw123456");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn corrupt_material_never_verifies() {
        let stored = StoredPassword {
            hash: "***".into(),
            salt: "***".into(),
        };
        assert!(!verify_password("anything", &stored));
    }

    #[test]
    fn login_then_authenticate_then_logout() {
        let fx = seed();
        db::set_user_password(&fx.conn, &fx.doctor_user.id, &hash_password("s3cret-pass")).unwrap();

        let session = login(&fx.conn, "DANA@example.com ", "s3cret-pass", Duration::hours(1)).unwrap();
        assert_eq!(session.user.id, fx.doctor_user.id);

        let actor = authenticate(&fx.conn, &session.token).unwrap();
        assert_eq!(actor.role, Role::Doctor { doctor_id: fx.doctor.id });

        assert!(logout(&fx.conn, &session.token).unwrap());
        assert!(matches!(
            authenticate(&fx.conn, &session.token),
            Err(AuthError::SessionInvalid)
        ));
    }

    #[test]
    fn wrong_password_and_unknown_email_look_the_same() {
        let fx = seed();
        db::set_user_password(&fx.conn, &fx.patient.id, &hash_password("patient-pass")).unwrap();

        let wrong = login(&fx.conn, "pat@example.com", "nope", Duration::hours(1)).unwrap_err();
        let unknown = login(&fx.conn, "ghost@example.com", "nope", Duration::hours(1)).unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn account_without_password_cannot_log_in() {
        let fx = seed();
        let err = login(&fx.conn, "sam@example.com", "", Duration::hours(1)).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn expired_session_is_rejected() {
        let fx = seed();
        db::set_user_password(&fx.conn, &fx.patient.id, &hash_password("patient-pass")).unwrap();
        let session = login(&fx.conn, "pat@example.com", "patient-pass", Duration::seconds(-1)).unwrap();
        assert!(matches!(
            authenticate(&fx.conn, &session.token),
            Err(AuthError::SessionInvalid)
        ));
    }

    #[test]
    fn bootstrap_admin_is_idempotent() {
        let conn = db::open_memory_database().unwrap();
        assert!(bootstrap_admin(&conn, "Root@Example.com", "admin-password").unwrap());
        assert!(!bootstrap_admin(&conn, "root@example.com", "other-password").unwrap());

        let session = login(&conn, "root@example.com", "admin-password", Duration::hours(1)).unwrap();
        assert_eq!(session.user.role, UserRole::Admin);
    }

    #[test]
    fn bootstrap_rejects_short_password() {
        let conn = db::open_memory_database().unwrap();
        assert!(matches!(
            bootstrap_admin(&conn, "root@example.com", "short"),
            Err(AuthError::WeakPassword)
        ));
    }
}
