//! 保养提醒的到期计算与状态判定
//!
//! 这里的计算都是同步纯函数，输入为提醒、计划规则以及批次开始时捕获的
//! "当前时间"和车辆里程快照，不读写任何持久化状态。

use chrono::{DateTime, Utc};
use fleet_core::{FleetError, FleetResult};

use crate::entities::{ReminderStatus, ServiceReminder};
use crate::value_objects::{DuePoint, DueWindow, ScheduleRule};

/// 一次判定使用的外部快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleReading {
    pub now: DateTime<Utc>,
    pub current_mileage: f64,
}

/// 单条提醒重新计算后的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReminderEvaluation {
    pub status: ReminderStatus,
    pub due: DuePoint,
    pub current_mileage: f64,
    pub mileage_variance: Option<f64>,
    pub days_until_due: Option<i64>,
}

/// 根据到期窗口判定状态
///
/// 到达到期点（含相等）即为 Overdue；到达即将到期起点为 DueSoon；否则为 Upcoming。
/// 终态保持不变。
pub fn classify_status(
    current: ReminderStatus,
    window: &DueWindow,
    reading: &VehicleReading,
) -> ReminderStatus {
    if current.is_terminal() {
        return current;
    }

    match window {
        DueWindow::Date { due, due_soon_from } => {
            if reading.now >= *due {
                ReminderStatus::Overdue
            } else if reading.now >= *due_soon_from {
                ReminderStatus::DueSoon
            } else {
                ReminderStatus::Upcoming
            }
        }
        DueWindow::Mileage { due, due_soon_from } => {
            if reading.current_mileage >= *due {
                ReminderStatus::Overdue
            } else if reading.current_mileage >= *due_soon_from {
                ReminderStatus::DueSoon
            } else {
                ReminderStatus::Upcoming
            }
        }
    }
}

/// 重新计算提醒的到期点、状态及展示字段
pub fn evaluate_reminder(
    reminder: &ServiceReminder,
    rule: &ScheduleRule,
    reading: &VehicleReading,
) -> FleetResult<ReminderEvaluation> {
    let window = rule
        .due_window(reminder.anchor)
        .ok_or(FleetError::ScheduleMismatch {
            reminder_id: reminder.id,
            schedule_id: reminder.service_schedule_id,
        })?;

    let status = classify_status(reminder.status, &window, reading);
    let (mileage_variance, days_until_due) = match window {
        DueWindow::Date { due, .. } => (
            None,
            Some((due.date_naive() - reading.now.date_naive()).num_days()),
        ),
        DueWindow::Mileage { due, .. } => (Some(due - reading.current_mileage), None),
    };

    Ok(ReminderEvaluation {
        status,
        due: window.due_point(),
        current_mileage: reading.current_mileage,
        mileage_variance,
        days_until_due,
    })
}

/// 把计算结果写回提醒，返回是否有字段发生变化
pub fn apply_evaluation(reminder: &mut ServiceReminder, evaluation: &ReminderEvaluation) -> bool {
    if reminder.status.is_terminal() {
        return false;
    }

    let changed = reminder.status != evaluation.status
        || reminder.due != evaluation.due
        || reminder.current_mileage != evaluation.current_mileage
        || reminder.mileage_variance != evaluation.mileage_variance
        || reminder.days_until_due != evaluation.days_until_due;

    if changed {
        reminder.status = evaluation.status;
        reminder.due = evaluation.due;
        reminder.current_mileage = evaluation.current_mileage;
        reminder.mileage_variance = evaluation.mileage_variance;
        reminder.days_until_due = evaluation.days_until_due;
        reminder.updated_at = Utc::now();
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ServiceSchedule;
    use crate::value_objects::{TimeInterval, TimeUnit};
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn time_rule() -> ScheduleRule {
        ScheduleRule::time(
            TimeInterval::new(6, TimeUnit::Months).unwrap(),
            Some(TimeInterval::new(2, TimeUnit::Weeks).unwrap()),
            utc(2025, 1, 1),
        )
    }

    fn mileage_rule() -> ScheduleRule {
        ScheduleRule::mileage(5000.0, Some(500.0), 10000.0).unwrap()
    }

    fn reminder_for(rule: &ScheduleRule) -> ServiceReminder {
        let mut schedule = ServiceSchedule::new(1, "计划".to_string(), rule.clone());
        schedule.id = 7;
        let mut reminder = ServiceReminder::new(1, &schedule, rule.first_anchor(), 0.0).unwrap();
        reminder.id = 100;
        reminder
    }

    fn at(now: DateTime<Utc>) -> VehicleReading {
        VehicleReading {
            now,
            current_mileage: 0.0,
        }
    }

    fn odometer(current_mileage: f64) -> VehicleReading {
        VehicleReading {
            now: utc(2025, 1, 1),
            current_mileage,
        }
    }

    #[test]
    fn test_time_schedule_classification() {
        let rule = time_rule();
        let reminder = reminder_for(&rule);

        let status = |now| {
            evaluate_reminder(&reminder, &rule, &at(now))
                .unwrap()
                .status
        };

        assert_eq!(status(utc(2025, 6, 10)), ReminderStatus::Upcoming);
        assert_eq!(status(utc(2025, 6, 17)), ReminderStatus::DueSoon);
        assert_eq!(status(utc(2025, 6, 18)), ReminderStatus::DueSoon);
        assert_eq!(status(utc(2025, 7, 1)), ReminderStatus::Overdue);
        assert_eq!(status(utc(2025, 9, 1)), ReminderStatus::Overdue);
    }

    #[test]
    fn test_mileage_schedule_classification() {
        let rule = mileage_rule();
        let reminder = reminder_for(&rule);

        let status = |mileage| {
            evaluate_reminder(&reminder, &rule, &odometer(mileage))
                .unwrap()
                .status
        };

        assert_eq!(status(14499.0), ReminderStatus::Upcoming);
        assert_eq!(status(14500.0), ReminderStatus::DueSoon);
        assert_eq!(status(14600.0), ReminderStatus::DueSoon);
        assert_eq!(status(15000.0), ReminderStatus::Overdue);
    }

    #[test]
    fn test_overdue_regardless_of_buffer() {
        // 缓冲大于间隔时，即将到期起点早于基准点，但到期点仍然判定为超期
        let rule = ScheduleRule::mileage(1000.0, Some(5000.0), 0.0).unwrap();
        let reminder = reminder_for(&rule);

        let eval = evaluate_reminder(&reminder, &rule, &odometer(0.0)).unwrap();
        assert_eq!(eval.status, ReminderStatus::DueSoon);

        let eval = evaluate_reminder(&reminder, &rule, &odometer(1000.0)).unwrap();
        assert_eq!(eval.status, ReminderStatus::Overdue);
    }

    #[test]
    fn test_terminal_status_is_never_recomputed() {
        let rule = mileage_rule();
        for terminal in [ReminderStatus::Completed, ReminderStatus::Cancelled] {
            let mut reminder = reminder_for(&rule);
            reminder.status = terminal;
            let before = reminder.clone();

            for mileage in [0.0, 14600.0, 99999.0] {
                let eval = evaluate_reminder(&reminder, &rule, &odometer(mileage)).unwrap();
                assert_eq!(eval.status, terminal);
                assert!(!apply_evaluation(&mut reminder, &eval));
                assert_eq!(reminder, before);
            }
        }
    }

    #[test]
    fn test_derived_fields() {
        let rule = mileage_rule();
        let reminder = reminder_for(&rule);
        let eval = evaluate_reminder(&reminder, &rule, &odometer(15200.0)).unwrap();
        assert_eq!(eval.mileage_variance, Some(-200.0));
        assert_eq!(eval.days_until_due, None);
        assert_eq!(eval.current_mileage, 15200.0);

        let rule = time_rule();
        let reminder = reminder_for(&rule);
        let eval = evaluate_reminder(&reminder, &rule, &at(utc(2025, 6, 21))).unwrap();
        assert_eq!(eval.days_until_due, Some(10));
        assert_eq!(eval.mileage_variance, None);

        let eval = evaluate_reminder(&reminder, &rule, &at(utc(2025, 7, 4))).unwrap();
        assert_eq!(eval.days_until_due, Some(-3));
    }

    #[test]
    fn test_due_point_follows_interval_edits() {
        let reminder = reminder_for(&mileage_rule());
        let edited = ScheduleRule::mileage(8000.0, Some(500.0), 10000.0).unwrap();

        let eval = evaluate_reminder(&reminder, &edited, &odometer(15000.0)).unwrap();
        assert_eq!(eval.due, DuePoint::Mileage(18000.0));
        assert_eq!(eval.status, ReminderStatus::Upcoming);
    }

    #[test]
    fn test_mismatched_rule_is_reported() {
        let reminder = reminder_for(&mileage_rule());
        let result = evaluate_reminder(&reminder, &time_rule(), &at(utc(2025, 1, 1)));
        assert!(matches!(
            result,
            Err(FleetError::ScheduleMismatch {
                reminder_id: 100,
                schedule_id: 7
            })
        ));
    }

    #[test]
    fn test_apply_evaluation_reports_changes_once() {
        let rule = mileage_rule();
        let mut reminder = reminder_for(&rule);

        let eval = evaluate_reminder(&reminder, &rule, &odometer(14600.0)).unwrap();
        assert!(apply_evaluation(&mut reminder, &eval));
        assert_eq!(reminder.status, ReminderStatus::DueSoon);
        assert_eq!(reminder.mileage_variance, Some(400.0));

        let eval = evaluate_reminder(&reminder, &rule, &odometer(14600.0)).unwrap();
        assert!(!apply_evaluation(&mut reminder, &eval));
    }
}
