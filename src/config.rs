use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Medibook";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
pub const DEFAULT_REMINDER_HOUR: u32 = 8;

/// Default tracing filter. `RUST_LOG` overrides it.
pub fn default_log_filter() -> &'static str {
    "medibook=info,medibook_lib=info,tower_http=info"
}

/// ~/Medibook/ on all platforms. Falls back to the working directory when
/// no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn database_path() -> PathBuf {
    app_data_dir().join("medibook.db")
}

/// Clock that schedule times, appointment dates and the reminder hour are
/// read on. Doctor schedules are entered in UTC; hospitals have no offset.
pub const SCHEDULE_CLOCK: &str = "UTC";

/// Runtime settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub database: PathBuf,
    pub session_ttl_hours: i64,
    /// UTC hour (0-23) at which the daily reminder run starts.
    pub reminder_hour: u32,
    pub notify_webhook: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Invalid values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = parse_or_default(get("MEDIBOOK_BIND"), "MEDIBOOK_BIND", || {
            SocketAddr::from(([127, 0, 0, 1], 8080))
        });

        let session_ttl_hours = parse_or_default(
            get("MEDIBOOK_SESSION_TTL_HOURS"),
            "MEDIBOOK_SESSION_TTL_HOURS",
            || DEFAULT_SESSION_TTL_HOURS,
        );
        let session_ttl_hours = if session_ttl_hours > 0 {
            session_ttl_hours
        } else {
            tracing::warn!(session_ttl_hours, "Session TTL must be positive, using default");
            DEFAULT_SESSION_TTL_HOURS
        };

        let reminder_hour = parse_or_default(
            get("MEDIBOOK_REMINDER_HOUR"),
            "MEDIBOOK_REMINDER_HOUR",
            || DEFAULT_REMINDER_HOUR,
        );
        let reminder_hour = if reminder_hour < 24 {
            reminder_hour
        } else {
            tracing::warn!(reminder_hour, "Reminder hour out of range, using default");
            DEFAULT_REMINDER_HOUR
        };

        Self {
            bind,
            database: get("MEDIBOOK_DB").map(PathBuf::from).unwrap_or_else(database_path),
            session_ttl_hours,
            reminder_hour,
            notify_webhook: get("MEDIBOOK_NOTIFY_WEBHOOK"),
            admin_email: get("MEDIBOOK_ADMIN_EMAIL"),
            admin_password: get("MEDIBOOK_ADMIN_PASSWORD"),
        }
    }
}

fn parse_or_default<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: impl FnOnce() -> T,
) -> T {
    match value {
        None => default(),
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid configuration value, using default");
            default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("Medibook"));
        assert!(database_path().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_with(&[]);
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.reminder_hour, 8);
        assert_eq!(config.database, database_path());
        assert!(config.notify_webhook.is_none());
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn reads_every_key() {
        let config = config_with(&[
            ("MEDIBOOK_BIND", "0.0.0.0:9000"),
            ("MEDIBOOK_DB", "/tmp/mb.db"),
            ("MEDIBOOK_SESSION_TTL_HOURS", "2"),
            ("MEDIBOOK_REMINDER_HOUR", "17"),
            ("MEDIBOOK_NOTIFY_WEBHOOK", "http://hooks.local/x"),
            ("MEDIBOOK_ADMIN_EMAIL", "root@example.com"),
            ("MEDIBOOK_ADMIN_PASSWORD", "hunter22"),
        ]);
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.database, PathBuf::from("/tmp/mb.db"));
        assert_eq!(config.session_ttl_hours, 2);
        assert_eq!(config.reminder_hour, 17);
        assert_eq!(config.notify_webhook.as_deref(), Some("http://hooks.local/x"));
        assert_eq!(config.admin_email.as_deref(), Some("root@example.com"));
        assert_eq!(config.admin_password.as_deref(), Some("hunter22"));
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_with(&[
            ("MEDIBOOK_BIND", "not-an-address"),
            ("MEDIBOOK_SESSION_TTL_HOURS", "-5"),
            ("MEDIBOOK_REMINDER_HOUR", "25"),
            ("MEDIBOOK_NOTIFY_WEBHOOK", "   "),
        ]);
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.session_ttl_hours, DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(config.reminder_hour, DEFAULT_REMINDER_HOUR);
        assert!(config.notify_webhook.is_none());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
