//! Structured log events for reminder lifecycle
//!
//! Every event carries an `event` field so log pipelines can filter on it
//! regardless of the human-readable message.

use chrono::{DateTime, Utc};
use fleet_core::FleetError;
use fleet_domain::entities::{ReminderStatus, ServiceReminder};
use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_reminder_status_changed(
        reminder: &ServiceReminder,
        previous: ReminderStatus,
    ) {
        info!(
            event = "reminder_status_changed",
            reminder.id = reminder.id,
            vehicle.id = reminder.vehicle_id,
            schedule.id = reminder.service_schedule_id,
            status.previous = previous.as_str(),
            status.current = reminder.status.as_str(),
            due = %reminder.due,
            "Reminder status changed"
        );
    }

    /// Log a reminder left untouched because its schedule or vehicle could not be loaded
    ///
    /// Dangling references are expected after deletions and stay at warn level;
    /// any other load failure is logged as an error.
    pub fn log_reminder_skipped(reminder: &ServiceReminder, cause: &FleetError) {
        if cause.is_missing_reference() {
            warn!(
                event = "reminder_skipped",
                reminder.id = reminder.id,
                vehicle.id = reminder.vehicle_id,
                schedule.id = reminder.service_schedule_id,
                missing_reference = true,
                reason = %cause,
                "Reminder skipped during status update"
            );
        } else {
            error!(
                event = "reminder_skipped",
                reminder.id = reminder.id,
                vehicle.id = reminder.vehicle_id,
                schedule.id = reminder.service_schedule_id,
                missing_reference = false,
                retryable = cause.is_retryable(),
                reason = %cause,
                "Reminder skipped during status update"
            );
        }
    }

    pub fn log_status_pass_completed(
        started_at: DateTime<Utc>,
        examined: usize,
        updated: usize,
        skipped: usize,
        duration_ms: u64,
    ) {
        info!(
            event = "status_pass_completed",
            pass.started_at = %started_at,
            pass.examined = examined,
            pass.updated = updated,
            pass.skipped = skipped,
            pass.duration_ms = duration_ms,
            "Reminder status pass completed"
        );
    }

    pub fn log_status_pass_failed(started_at: DateTime<Utc>, error_message: &str, retryable: bool) {
        error!(
            event = "status_pass_failed",
            pass.started_at = %started_at,
            pass.error = error_message,
            pass.retryable = retryable,
            "Reminder status pass failed"
        );
    }

    pub fn log_reminder_completed(completed: &ServiceReminder, next: Option<&ServiceReminder>) {
        info!(
            event = "reminder_completed",
            reminder.id = completed.id,
            vehicle.id = completed.vehicle_id,
            work_order.id = ?completed.work_order_id,
            next_reminder.id = ?next.map(|r| r.id),
            next_reminder.due = ?next.map(|r| r.due),
            "Reminder completed"
        );
    }

    pub fn log_reminder_cancelled(reminder: &ServiceReminder, reason: &str) {
        debug!(
            event = "reminder_cancelled",
            reminder.id = reminder.id,
            vehicle.id = reminder.vehicle_id,
            reason = reason,
            "Reminder cancelled"
        );
    }
}
