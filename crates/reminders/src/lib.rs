//! 保养提醒的后台状态更新与生命周期操作

pub mod completion;
pub mod enrollment;
pub mod status_updater;
pub mod trigger;

pub use completion::ReminderCompletionService;
pub use enrollment::EnrollmentService;
pub use status_updater::{ReminderStatusUpdater, StatusUpdateReport, StatusUpdaterService};
pub use trigger::ReminderStatusTrigger;
