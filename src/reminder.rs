//! Daily appointment reminders.
//!
//! A background thread wakes every few seconds and, once per UTC day at the
//! configured hour, notifies patients of their appointments for the next
//! day. Runs are sequential, so they never overlap. A failed send is logged
//! and the run moves on to the next appointment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Timelike, Utc};
use rusqlite::Connection;

use crate::core_state::CoreState;
use crate::db::{self, now_utc, DatabaseError};
use crate::notify::{Notification, NotificationKind, Notifier};

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub sent: usize,
    pub failed: usize,
}

/// Notify every patient with a held appointment on the day after `today`
/// that has not been reminded yet.
pub fn run_reminders(
    conn: &Connection,
    notifier: &dyn Notifier,
    today: NaiveDate,
) -> Result<ReminderReport, DatabaseError> {
    let Some(target) = today.succ_opt() else {
        return Ok(ReminderReport::default());
    };
    let due = db::list_due_for_reminder(conn, &target)?;
    let mut report = ReminderReport::default();

    for appt in due {
        let notification = Notification {
            recipient_user_id: appt.patient_id,
            appointment_id: appt.id,
            kind: NotificationKind::Reminder,
            message: format!(
                "Reminder: appointment {} tomorrow at {}",
                appt.booking_code,
                appt.time_slot.start_time.format("%H:%M")
            ),
        };

        match notifier.send(&notification) {
            Ok(()) => {
                if let Err(e) = db::mark_reminder_sent(conn, &appt.id, &now_utc()) {
                    tracing::warn!(appointment_id = %appt.id, error = %e, "Reminder sent but not recorded");
                }
                report.sent += 1;
            }
            Err(e) => {
                tracing::warn!(appointment_id = %appt.id, error = %e, "Reminder failed, continuing");
                report.failed += 1;
            }
        }
    }

    tracing::info!(%target, sent = report.sent, failed = report.failed, "Reminder run finished");
    Ok(report)
}

/// Handle for the reminder thread. Dropping it stops the thread.
pub struct ReminderHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ReminderHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Start the daily reminder thread. Call from inside the tokio runtime so
/// async notifiers can spawn their deliveries.
pub fn start_reminder_job(state: Arc<CoreState>, hour: u32) -> ReminderHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let runtime = tokio::runtime::Handle::try_current().ok();

    let handle = std::thread::spawn(move || {
        let _guard = runtime.as_ref().map(|rt| rt.enter());
        tracing::info!(hour, "Reminder job started");
        reminder_loop(&state, hour, &flag);
        tracing::info!("Reminder job shutting down");
    });

    ReminderHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn reminder_loop(state: &CoreState, hour: u32, shutdown: &AtomicBool) {
    let mut last_run: Option<NaiveDate> = None;

    while !shutdown.load(Ordering::Relaxed) {
        let now = Utc::now();
        let today = now.date_naive();
        if now.hour() >= hour && last_run != Some(today) {
            last_run = Some(today);
            let result = state
                .open_db()
                .map_err(|e| e.to_string())
                .and_then(|conn| {
                    run_reminders(&conn, state.notifier(), today).map_err(|e| e.to_string())
                });
            if let Err(e) = result {
                tracing::error!(error = %e, "Reminder run failed");
            }
        }
        std::thread::sleep(Duration::from_secs(SLEEP_GRANULARITY_SECS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentStatus, User, UserRole};
    use crate::notify::RecordingNotifier;
    use crate::test_support::{appointment_template, future_date, insert_appointment_with, seed};
    use uuid::Uuid;

    #[test]
    fn reminds_tomorrows_held_appointments_once() {
        let fx = seed();
        let today = Utc::now().date_naive();
        let tomorrow = future_date(1);
        insert_appointment_with(&fx, AppointmentStatus::Confirmed, tomorrow, 9);
        insert_appointment_with(&fx, AppointmentStatus::Pending, tomorrow, 10);
        insert_appointment_with(&fx, AppointmentStatus::Cancelled, tomorrow, 11);
        insert_appointment_with(&fx, AppointmentStatus::Confirmed, future_date(2), 9);

        let notifier = RecordingNotifier::default();
        let report = run_reminders(&fx.conn, &notifier, today).unwrap();
        assert_eq!(report, ReminderReport { sent: 2, failed: 0 });
        assert!(notifier
            .sent()
            .iter()
            .all(|n| n.kind == NotificationKind::Reminder && n.recipient_user_id == fx.patient.id));

        let again = run_reminders(&fx.conn, &notifier, today).unwrap();
        assert_eq!(again, ReminderReport::default());
    }

    #[test]
    fn one_failing_recipient_does_not_stop_the_run() {
        let fx = seed();
        let today = Utc::now().date_naive();
        let tomorrow = future_date(1);

        let other = User {
            id: Uuid::new_v4(),
            email: "kim@example.com".into(),
            name: "Kim".into(),
            role: UserRole::Patient,
            phone: None,
            created_at: now_utc(),
        };
        db::insert_user(&fx.conn, &other, None).unwrap();

        let failing = insert_appointment_with(&fx, AppointmentStatus::Confirmed, tomorrow, 9);
        let mut ok = appointment_template(&fx, tomorrow, 10);
        ok.patient_id = other.id;
        db::insert_appointment(&fx.conn, &ok).unwrap();

        let notifier = RecordingNotifier::failing_for(fx.patient.id);
        let report = run_reminders(&fx.conn, &notifier, today).unwrap();
        assert_eq!(report, ReminderReport { sent: 1, failed: 1 });

        let failed = db::get_appointment(&fx.conn, &failing.id).unwrap().unwrap();
        assert!(failed.reminder_sent_at.is_none());
        let sent = db::get_appointment(&fx.conn, &ok.id).unwrap().unwrap();
        assert!(sent.reminder_sent_at.is_some());
    }

    #[test]
    fn stale_transition_cannot_clear_reminder_flag() {
        let fx = seed();
        let today = Utc::now().date_naive();
        let appt = insert_appointment_with(&fx, AppointmentStatus::Pending, future_date(1), 9);

        // Loaded before the reminder run stamps the row
        let mut stale = db::get_appointment(&fx.conn, &appt.id).unwrap().unwrap();
        let notifier = RecordingNotifier::default();
        assert_eq!(run_reminders(&fx.conn, &notifier, today).unwrap().sent, 1);

        stale.status = AppointmentStatus::Confirmed;
        assert!(!db::update_appointment_versioned(&fx.conn, &stale).unwrap());

        let stored = db::get_appointment(&fx.conn, &appt.id).unwrap().unwrap();
        assert!(stored.reminder_sent_at.is_some());
        assert_eq!(stored.status, AppointmentStatus::Pending);
        assert_eq!(stored.version, stale.version + 1);
        assert!(db::list_due_for_reminder(&fx.conn, &future_date(1)).unwrap().is_empty());

        let again = run_reminders(&fx.conn, &notifier, today).unwrap();
        assert_eq!(again, ReminderReport::default());
        assert_eq!(notifier.sent().len(), 1);
    }

    #[test]
    fn handle_stops_thread_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(CoreState::new(
            dir.path().join("medibook.db"),
            Arc::new(RecordingNotifier::default()),
            chrono::Duration::hours(1),
        ));
        let handle = start_reminder_job(state, 23);
        handle.shutdown();
        drop(handle);
    }
}
