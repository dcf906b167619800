use chrono::Timelike;
use tracing::{debug, warn};

use crate::habit::HabitRecord;
use crate::ports::{NotificationHandle, ReminderRequest, ReminderScheduler};

/// Schedules the habit's reminder when it has an enabled one. Failures are
/// logged and reported as `None`.
pub(crate) async fn schedule_for(
    scheduler: &dyn ReminderScheduler,
    habit: &HabitRecord,
) -> Option<NotificationHandle> {
    let reminder = habit.reminder().filter(|reminder| reminder.enabled)?;
    let request = ReminderRequest {
        habit_id: habit.id().clone(),
        title: habit.name().to_string(),
        icon: habit.icon().to_string(),
        hour: reminder.time.hour(),
        minute: reminder.time.minute(),
    };
    match scheduler.schedule(request).await {
        Ok(handle) => {
            debug!(habit_id = %habit.id(), %handle, "reminder scheduled");
            Some(handle)
        }
        Err(err) => {
            warn!(habit_id = %habit.id(), %err, "failed to schedule reminder");
            None
        }
    }
}

/// Best-effort cancel; a failure never blocks the caller.
pub(crate) async fn cancel_quietly(scheduler: &dyn ReminderScheduler, handle: &NotificationHandle) {
    if let Err(err) = scheduler.cancel(handle).await {
        warn!(%handle, %err, "failed to cancel reminder");
    }
}
