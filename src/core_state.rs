//! Shared application state for the HTTP layer and background jobs.
//!
//! Holds no connection: each request opens its own through `open_db`,
//! so handlers never share a `rusqlite::Connection` across threads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::config::ServerConfig;
use crate::db;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};

/// Audit entries older than this are pruned at startup.
pub const AUDIT_RETENTION_DAYS: i64 = 90;

pub struct CoreState {
    db_path: PathBuf,
    notifier: Arc<dyn Notifier>,
    pub session_ttl: chrono::Duration,
}

impl CoreState {
    pub fn new(db_path: PathBuf, notifier: Arc<dyn Notifier>, session_ttl: chrono::Duration) -> Self {
        Self {
            db_path,
            notifier,
            session_ttl,
        }
    }

    /// Build state from configuration: ensure the database directory exists,
    /// run migrations once, and pick the notifier.
    pub fn from_config(config: &ServerConfig) -> Result<Self, CoreError> {
        if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::Setup(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        // Migrations run on open
        db::open_database(&config.database)?;

        let notifier: Arc<dyn Notifier> = match &config.notify_webhook {
            Some(url) => {
                tracing::info!(%url, "Delivering notifications by webhook");
                Arc::new(WebhookNotifier::new(url).map_err(|e| CoreError::Setup(e.to_string()))?)
            }
            None => Arc::new(LogNotifier),
        };

        Ok(Self::new(
            config.database.clone(),
            notifier,
            chrono::Duration::hours(config.session_ttl_hours),
        ))
    }

    /// Open a fresh connection to the application database.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Append to the audit trail. Failures are logged, never returned.
    pub fn record_access(&self, user_id: Option<&Uuid>, action: &str, outcome: &str) {
        let user_id = user_id.map(|id| id.to_string());
        let result = self
            .open_db()
            .and_then(|conn| Ok(db::insert_audit_entry(&conn, user_id.as_deref(), action, outcome)?));
        if let Err(e) = result {
            tracing::warn!(error = %e, action, "Failed to write audit entry");
        }
    }

    /// Drop audit entries past retention. Returns how many were removed.
    pub fn prune_audit(&self) -> Result<usize, CoreError> {
        let conn = self.open_db()?;
        Ok(db::prune_audit_log(&conn, AUDIT_RETENTION_DAYS)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Setup failed: {0}")]
    Setup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> ServerConfig {
        let mut config = ServerConfig::from_lookup(|_| None);
        config.database = dir.join("nested").join("medibook.db");
        config
    }

    #[test]
    fn from_config_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::from_config(&config_in(dir.path())).unwrap();
        assert!(state.db_path().exists());
        assert_eq!(state.session_ttl, chrono::Duration::hours(24));

        let conn = state.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 13);
    }

    #[test]
    fn record_access_writes_audit_row() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::from_config(&config_in(dir.path())).unwrap();
        let user = Uuid::new_v4();

        state.record_access(Some(&user), "PUT /api/appointments/x/confirmed", "status:200");
        state.record_access(None, "POST /api/auth/login", "status:401");

        let conn = state.open_db().unwrap();
        let rows = db::query_audit_by_user(&conn, &user.to_string()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].2, "status:200");
        assert_eq!(state.prune_audit().unwrap(), 0);
    }

    #[test]
    fn webhook_config_builds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.notify_webhook = Some("http://127.0.0.1:9/hook".into());
        assert!(CoreState::from_config(&config).is_ok());
    }
}
