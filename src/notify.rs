//! Outbound notifications for appointment events.
//!
//! Delivery is best-effort: callers log a failed `send` and carry on.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Booked,
    Confirmed,
    Rejected,
    Cancelled,
    Rescheduled,
    Completed,
    NoShow,
    Reminder,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient_user_id: Uuid,
    pub appointment_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("No async runtime available for delivery")]
    NoRuntime,
    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Default when no webhook is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient_user_id,
            appointment_id = %notification.appointment_id,
            kind = ?notification.kind,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a fixed URL.
///
/// `send` only queues the request on the current tokio runtime; HTTP
/// failures are logged by the spawned task.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Rejected(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| NotifyError::NoRuntime)?;
        let request = self.client.post(&self.url).json(notification);
        let appointment_id = notification.appointment_id;

        handle.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    tracing::warn!(%appointment_id, status = %resp.status(), "Webhook rejected notification");
                }
                Err(e) => {
                    tracing::warn!(%appointment_id, error = %e, "Webhook delivery failed");
                }
            }
        });
        Ok(())
    }
}

/// Keeps every notification in memory. Used by tests.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail_for: Option<Uuid>,
}

impl RecordingNotifier {
    /// A recorder that refuses notifications addressed to `recipient`.
    pub fn failing_for(recipient: Uuid) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(recipient),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail_for == Some(notification.recipient_user_id) {
            return Err(NotifyError::Rejected("recipient unreachable".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}

/// Send and log on failure. Never propagates.
pub fn dispatch(notifier: &dyn Notifier, notification: Notification) {
    if let Err(e) = notifier.send(&notification) {
        tracing::warn!(
            recipient = %notification.recipient_user_id,
            appointment_id = %notification.appointment_id,
            error = %e,
            "Notification not delivered"
        );
    }
}
