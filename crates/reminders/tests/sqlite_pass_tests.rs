use std::sync::Arc;

use anyhow::Result;
use fleet_core::CancellationSignal;
use fleet_domain::entities::{ReminderStatus, ServiceProgram, ServiceSchedule, Vehicle};
use fleet_domain::value_objects::ScheduleRule;
use fleet_infrastructure::DatabaseManager;
use fleet_reminders::{EnrollmentService, ReminderStatusUpdater};
use fleet_testing_utils::{in_memory_database, utc};

/// 两辆车加入同一个里程方案，返回两条提醒的 ID
async fn seed(db: &DatabaseManager) -> Result<(i64, i64)> {
    let vehicles = db.vehicle_repository();
    let first = vehicles
        .create(&Vehicle::new("一号车".to_string(), "VIN-SQL-0001".to_string(), 14600.0))
        .await?;
    let second = vehicles
        .create(&Vehicle::new("二号车".to_string(), "VIN-SQL-0002".to_string(), 15200.0))
        .await?;

    let program = db
        .service_program_repository()
        .create(&ServiceProgram::new("里程保养".to_string(), None))
        .await?;
    db.service_schedule_repository()
        .create(&ServiceSchedule::new(
            program.id,
            "换机油".to_string(),
            ScheduleRule::mileage(5000.0, Some(500.0), 10000.0)?,
        ))
        .await?;

    let enrollment = EnrollmentService::new(
        db.vehicle_repository(),
        db.service_program_repository(),
        db.service_schedule_repository(),
        db.service_reminder_repository(),
    );
    let first_reminder = enrollment.enroll_vehicle(first.id, program.id).await?;
    let second_reminder = enrollment.enroll_vehicle(second.id, program.id).await?;
    Ok((first_reminder[0].id, second_reminder[0].id))
}

fn updater(db: &DatabaseManager) -> ReminderStatusUpdater {
    ReminderStatusUpdater::new(
        db.service_reminder_repository(),
        db.service_schedule_repository(),
        db.vehicle_repository(),
    )
}

#[tokio::test]
async fn test_failed_commit_leaves_every_reminder_unchanged() -> Result<()> {
    let db = in_memory_database().await?;
    let (first, second) = seed(&db).await?;
    let reminders = db.service_reminder_repository();

    sqlx::query(&format!(
        "CREATE TRIGGER reject_reminder_update BEFORE UPDATE ON service_reminders
         WHEN OLD.id = {second} BEGIN SELECT RAISE(ABORT, 'rejected'); END"
    ))
    .execute(db.pool())
    .await?;

    let result = updater(&db)
        .update_all_reminder_statuses_at(utc(2025, 6, 18), &CancellationSignal::never())
        .await;
    assert!(result.is_err());

    // 第一条提醒已在事务内写入，随整批回滚
    let stored = reminders.get_by_id(first).await?.unwrap();
    assert_eq!(stored.status, ReminderStatus::Upcoming);
    assert_eq!(stored.mileage_variance, None);

    sqlx::query("DROP TRIGGER reject_reminder_update")
        .execute(db.pool())
        .await?;

    let report = updater(&db)
        .update_all_reminder_statuses_at(utc(2025, 6, 18), &CancellationSignal::never())
        .await?;
    assert_eq!(report.updated, 2);
    assert_eq!(
        reminders.get_by_id(first).await?.unwrap().status,
        ReminderStatus::DueSoon
    );
    assert_eq!(
        reminders.get_by_id(second).await?.unwrap().status,
        ReminderStatus::Overdue
    );
    Ok(())
}
