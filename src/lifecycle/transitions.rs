use crate::models::AppointmentStatus;

use super::LifecycleError;

/// Statuses reachable from `status` in one step.
///
/// `rescheduled` awaits the doctor again, so it accepts confirm and reject
/// like `pending`.
pub fn allowed_next(status: AppointmentStatus) -> &'static [AppointmentStatus] {
    use AppointmentStatus::*;
    match status {
        Pending => &[Confirmed, Rejected, Cancelled, Rescheduled],
        Confirmed => &[Completed, Cancelled, Rescheduled, NoShow],
        Rescheduled => &[Confirmed, Rejected, Cancelled, Rescheduled],
        // Terminal
        Completed | Rejected | Cancelled | NoShow => &[],
    }
}

pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    allowed_next(from).contains(&to)
}

pub fn ensure_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), LifecycleError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        tracing::debug!(%from, %to, "Rejected status transition");
        Err(LifecycleError::InvalidState(format!(
            "Cannot move appointment from '{from}' to '{to}'"
        )))
    }
}
