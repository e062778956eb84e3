use anyhow::Result;
use chrono::{TimeZone, Utc};
use fleet_core::{DatabaseConfig, FleetError};
use fleet_domain::entities::{
    ReminderStatus, ServiceProgram, ServiceReminder, ServiceSchedule, ServiceTask,
    ServiceTaskCategory, Vehicle,
};
use fleet_domain::value_objects::{DuePoint, ScheduleRule, TimeInterval, TimeUnit};
use fleet_infrastructure::{run_migrations, DatabaseManager};

async fn memory_database() -> Result<DatabaseManager> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    Ok(DatabaseManager::new(&config).await?)
}

async fn seed_schedule(db: &DatabaseManager, rule: ScheduleRule) -> Result<ServiceSchedule> {
    let program = db
        .service_program_repository()
        .create(&ServiceProgram::new(format!("方案-{}", rule.schedule_type().as_str()), None))
        .await?;
    let schedule = ServiceSchedule::new(program.id, "计划".to_string(), rule);
    Ok(db.service_schedule_repository().create(&schedule).await?)
}

#[tokio::test]
async fn test_migrations_are_idempotent() -> Result<()> {
    let db = memory_database().await?;
    run_migrations(db.pool()).await?;
    db.health_check().await?;
    Ok(())
}

#[tokio::test]
async fn test_vehicle_repository_mileage() -> Result<()> {
    let db = memory_database().await?;
    let repo = db.vehicle_repository();

    let created = repo
        .create(&Vehicle::new("货车一号".to_string(), "VIN0001".to_string(), 12000.5))
        .await?;
    assert!(created.id > 0);
    assert_eq!(repo.get_current_mileage(created.id).await?, 12000.5);

    repo.update_mileage(created.id, 13000.0).await?;
    let fetched = repo.get_by_id(created.id).await?.unwrap();
    assert_eq!(fetched.current_mileage, 13000.0);
    assert_eq!(fetched.vin, "VIN0001");

    assert!(matches!(
        repo.get_current_mileage(999).await,
        Err(FleetError::VehicleNotFound { id: 999 })
    ));
    assert!(repo.update_mileage(created.id, -1.0).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_program_enrollment() -> Result<()> {
    let db = memory_database().await?;
    let vehicle = db
        .vehicle_repository()
        .create(&Vehicle::new("车".to_string(), "VIN0002".to_string(), 0.0))
        .await?;
    let programs = db.service_program_repository();
    let program = programs
        .create(&ServiceProgram::new("轻型车辆".to_string(), Some("每半年".to_string())))
        .await?;

    assert!(programs.enroll_vehicle(program.id, vehicle.id).await?);
    assert!(!programs.enroll_vehicle(program.id, vehicle.id).await?);
    assert!(programs.unenroll_vehicle(program.id, vehicle.id).await?);
    assert!(!programs.unenroll_vehicle(program.id, vehicle.id).await?);
    Ok(())
}

#[tokio::test]
async fn test_schedule_rules_round_trip() -> Result<()> {
    let db = memory_database().await?;
    let tasks = db.service_task_repository();
    let oil = tasks
        .create(&ServiceTask::new("更换机油".to_string(), ServiceTaskCategory::Preventive))
        .await?;
    let fetched_task = tasks.get_by_id(oil.id).await?.unwrap();
    assert_eq!(fetched_task.category, ServiceTaskCategory::Preventive);

    let time_rule = ScheduleRule::time(
        TimeInterval::new(6, TimeUnit::Months)?,
        Some(TimeInterval::new(2, TimeUnit::Weeks)?),
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    );
    let program = db
        .service_program_repository()
        .create(&ServiceProgram::new("重型车辆".to_string(), None))
        .await?;
    let mut schedule = ServiceSchedule::new(program.id, "半年保养".to_string(), time_rule.clone());
    schedule.service_task_ids = vec![oil.id];

    let schedules = db.service_schedule_repository();
    let created = schedules.create(&schedule).await?;
    let fetched = schedules.get_by_id(created.id).await?.unwrap();
    assert_eq!(fetched.rule, time_rule);
    assert_eq!(fetched.service_task_ids, vec![oil.id]);

    let mileage_rule = ScheduleRule::mileage(5000.0, None, 0.0)?;
    let mut edited = fetched.clone();
    edited.rule = mileage_rule.clone();
    edited.service_task_ids.clear();
    schedules.update(&edited).await?;

    let by_program = schedules.get_by_program(program.id).await?;
    assert_eq!(by_program.len(), 1);
    assert_eq!(by_program[0].rule, mileage_rule);
    assert!(by_program[0].service_task_ids.is_empty());

    edited.id = 4040;
    assert!(matches!(
        schedules.update(&edited).await,
        Err(FleetError::ScheduleNotFound { id: 4040 })
    ));
    Ok(())
}

#[tokio::test]
async fn test_batch_save_skips_terminal_reminders() -> Result<()> {
    let db = memory_database().await?;
    let schedule = seed_schedule(&db, ScheduleRule::mileage(5000.0, Some(500.0), 10000.0)?).await?;
    let repo = db.service_reminder_repository();

    let first = repo
        .create(&ServiceReminder::new(1, &schedule, schedule.rule.first_anchor(), 0.0)?)
        .await?;
    let second = repo
        .create(&ServiceReminder::new(2, &schedule, schedule.rule.first_anchor(), 0.0)?)
        .await?;
    assert_eq!(first.due, DuePoint::Mileage(15000.0));
    assert_eq!(repo.get_open_reminders().await?.len(), 2);

    let cancelled = repo.cancel(second.id).await?;
    assert_eq!(cancelled.status, ReminderStatus::Cancelled);

    let mut first_update = first.clone();
    first_update.status = ReminderStatus::DueSoon;
    first_update.current_mileage = 14600.0;
    first_update.mileage_variance = Some(400.0);
    let mut second_update = second.clone();
    second_update.status = ReminderStatus::Overdue;

    let written = repo
        .save_reminder_updates(&[first_update, second_update])
        .await?;
    assert_eq!(written, vec![first.id]);

    let stored_first = repo.get_by_id(first.id).await?.unwrap();
    assert_eq!(stored_first.status, ReminderStatus::DueSoon);
    assert_eq!(stored_first.mileage_variance, Some(400.0));
    let stored_second = repo.get_by_id(second.id).await?.unwrap();
    assert_eq!(stored_second.status, ReminderStatus::Cancelled);

    let open = repo.get_open_by_vehicle(2).await?;
    assert!(open.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_complete_and_schedule_next() -> Result<()> {
    let db = memory_database().await?;
    let schedule = seed_schedule(&db, ScheduleRule::mileage(5000.0, None, 10000.0)?).await?;
    let repo = db.service_reminder_repository();

    let reminder = repo
        .create(&ServiceReminder::new(1, &schedule, schedule.rule.first_anchor(), 0.0)?)
        .await?;

    let mut completed = reminder.clone();
    completed.mark_completed(77, Utc::now(), 15100.0)?;
    let anchor = schedule.rule.completion_anchor(Utc::now(), 15100.0);
    let next = ServiceReminder::new(1, &schedule, anchor, 15100.0)?;

    let created = repo
        .complete_and_schedule_next(&completed, Some(&next))
        .await?
        .unwrap();
    assert_eq!(created.due, DuePoint::Mileage(20100.0));
    assert_eq!(created.status, ReminderStatus::Upcoming);

    let stored = repo.get_by_id(reminder.id).await?.unwrap();
    assert_eq!(stored.status, ReminderStatus::Completed);
    assert_eq!(stored.work_order_id, Some(77));
    assert_eq!(stored.completion_mileage, Some(15100.0));

    let again = repo.complete_and_schedule_next(&completed, Some(&next)).await;
    assert!(matches!(
        again,
        Err(FleetError::InvalidStateTransition { .. })
    ));
    assert_eq!(repo.get_open_by_vehicle(1).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_link_and_cancel_refuse_terminal_reminders() -> Result<()> {
    let db = memory_database().await?;
    let schedule = seed_schedule(&db, ScheduleRule::mileage(5000.0, None, 10000.0)?).await?;
    let repo = db.service_reminder_repository();

    let reminder = repo
        .create(&ServiceReminder::new(1, &schedule, schedule.rule.first_anchor(), 0.0)?)
        .await?;
    let linked = repo.link_work_order(reminder.id, 31).await?;
    assert_eq!(linked.work_order_id, Some(31));
    assert_eq!(linked.status, ReminderStatus::Upcoming);

    let mut completed = reminder.clone();
    completed.mark_completed(31, Utc::now(), 15000.0)?;
    let next = ServiceReminder::new(
        1,
        &schedule,
        schedule.rule.completion_anchor(Utc::now(), 15000.0),
        15000.0,
    )?;
    repo.complete_and_schedule_next(&completed, Some(&next)).await?;

    // 完成之前读到的副本不能再改写已完成的提醒
    assert!(matches!(
        repo.link_work_order(reminder.id, 99).await,
        Err(FleetError::InvalidStateTransition { id, .. }) if id == reminder.id
    ));
    assert!(matches!(
        repo.cancel(reminder.id).await,
        Err(FleetError::InvalidStateTransition { .. })
    ));
    assert!(matches!(
        repo.cancel(4242).await,
        Err(FleetError::ReminderNotFound { id: 4242 })
    ));

    let stored = repo.get_by_id(reminder.id).await?.unwrap();
    assert_eq!(stored.status, ReminderStatus::Completed);
    assert_eq!(stored.work_order_id, Some(31));
    assert_eq!(stored.completion_mileage, Some(15000.0));
    assert_eq!(repo.get_open_by_vehicle(1).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_batch_save_rolls_back_when_a_row_fails() -> Result<()> {
    let db = memory_database().await?;
    let schedule = seed_schedule(&db, ScheduleRule::mileage(5000.0, Some(500.0), 10000.0)?).await?;
    let repo = db.service_reminder_repository();

    let first = repo
        .create(&ServiceReminder::new(1, &schedule, schedule.rule.first_anchor(), 0.0)?)
        .await?;
    let second = repo
        .create(&ServiceReminder::new(2, &schedule, schedule.rule.first_anchor(), 0.0)?)
        .await?;

    sqlx::query(&format!(
        "CREATE TRIGGER reject_reminder_update BEFORE UPDATE ON service_reminders
         WHEN OLD.id = {} BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        second.id
    ))
    .execute(db.pool())
    .await?;

    let mut first_update = first.clone();
    first_update.status = ReminderStatus::Overdue;
    first_update.current_mileage = 15200.0;
    first_update.mileage_variance = Some(-200.0);
    let mut second_update = second.clone();
    second_update.status = ReminderStatus::DueSoon;

    let result = repo
        .save_reminder_updates(&[first_update, second_update])
        .await;
    assert!(result.is_err());

    // 第一条的写入随事务一起回滚
    let stored_first = repo.get_by_id(first.id).await?.unwrap();
    assert_eq!(stored_first.status, ReminderStatus::Upcoming);
    assert_eq!(stored_first.current_mileage, 0.0);
    assert_eq!(stored_first.mileage_variance, first.mileage_variance);
    assert_eq!(
        repo.get_by_id(second.id).await?.unwrap().status,
        ReminderStatus::Upcoming
    );
    Ok(())
}

#[tokio::test]
async fn test_schedule_rows_with_conflicting_columns_are_rejected() -> Result<()> {
    let db = memory_database().await?;
    let schedules = db.service_schedule_repository();
    let time_schedule = seed_schedule(
        &db,
        ScheduleRule::time(
            TimeInterval::new(6, TimeUnit::Months)?,
            None,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ),
    )
    .await?;
    let mileage_schedule =
        seed_schedule(&db, ScheduleRule::mileage(5000.0, Some(500.0), 0.0)?).await?;

    let corrupt = |sql: &'static str, id: i64| {
        let pool = db.pool().clone();
        async move { sqlx::query(sql).bind(id).execute(&pool).await }
    };

    // 按时间计划残留了里程字段
    corrupt(
        "UPDATE service_schedules SET mileage_interval = 5000 WHERE id = $1",
        time_schedule.id,
    )
    .await?;
    assert!(matches!(
        schedules.get_by_id(time_schedule.id).await,
        Err(FleetError::Serialization(_))
    ));

    // 按里程计划残留了日期字段
    corrupt(
        "UPDATE service_schedules SET time_interval_value = 3 WHERE id = $1",
        mileage_schedule.id,
    )
    .await?;
    assert!(matches!(
        schedules.get_by_id(mileage_schedule.id).await,
        Err(FleetError::Serialization(_))
    ));

    // 缓冲只有数值没有单位
    corrupt(
        "UPDATE service_schedules SET mileage_interval = NULL, time_buffer_value = 2 WHERE id = $1",
        time_schedule.id,
    )
    .await?;
    assert!(matches!(
        schedules.get_by_id(time_schedule.id).await,
        Err(FleetError::Serialization(_))
    ));
    Ok(())
}
