use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use fleet_core::{CancellationSignal, CancellationSource, FleetError, FleetResult};
use fleet_domain::entities::{ReminderStatus, Vehicle};
use fleet_domain::repositories::VehicleRepository;
use fleet_domain::value_objects::{DuePoint, ScheduleRule};
use fleet_reminders::ReminderStatusUpdater;
use fleet_testing_utils::{
    utc, MockServiceReminderRepository, MockServiceScheduleRepository, MockVehicleRepository,
    ReminderBuilder, ScheduleBuilder, VehicleBuilder,
};

struct Fixture {
    vehicles: MockVehicleRepository,
    schedules: MockServiceScheduleRepository,
    reminders: MockServiceReminderRepository,
    updater: ReminderStatusUpdater,
}

/// 车辆1（里程14600）同时有一个里程计划和一个半年计划的提醒
fn fixture() -> Fixture {
    let vehicles = MockVehicleRepository::with_vehicles(vec![
        VehicleBuilder::new().with_id(1).with_mileage(14600.0).build(),
        VehicleBuilder::new()
            .with_id(2)
            .with_vin("VIN-TEST-0002")
            .with_mileage(1000.0)
            .build(),
    ]);

    let mileage_schedule = ScheduleBuilder::mileage(5000.0, Some(500.0), 10000.0)
        .with_id(1)
        .build();
    let time_schedule = ScheduleBuilder::half_yearly().with_id(2).build();

    let reminders = MockServiceReminderRepository::with_reminders(vec![
        ReminderBuilder::for_schedule(&mileage_schedule)
            .with_id(10)
            .with_vehicle(1)
            .build(),
        ReminderBuilder::for_schedule(&time_schedule)
            .with_id(11)
            .with_vehicle(1)
            .build(),
    ]);
    let schedules =
        MockServiceScheduleRepository::with_schedules(vec![mileage_schedule, time_schedule]);

    let updater = ReminderStatusUpdater::new(
        Arc::new(reminders.clone()),
        Arc::new(schedules.clone()),
        Arc::new(vehicles.clone()),
    );

    Fixture {
        vehicles,
        schedules,
        reminders,
        updater,
    }
}

/// 在读取里程时执行回调的车辆仓储，用于在批次进行中注入外部事件
struct ScriptedVehicles {
    inner: MockVehicleRepository,
    on_read: Box<dyn Fn(i64) -> FleetResult<()> + Send + Sync>,
}

#[async_trait]
impl VehicleRepository for ScriptedVehicles {
    async fn create(&self, vehicle: &Vehicle) -> FleetResult<Vehicle> {
        self.inner.create(vehicle).await
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Vehicle>> {
        self.inner.get_by_id(id).await
    }

    async fn get_current_mileage(&self, vehicle_id: i64) -> FleetResult<f64> {
        (self.on_read)(vehicle_id)?;
        self.inner.get_current_mileage(vehicle_id).await
    }

    async fn update_mileage(&self, vehicle_id: i64, mileage: f64) -> FleetResult<()> {
        self.inner.update_mileage(vehicle_id, mileage).await
    }
}

impl Fixture {
    fn scripted_updater(
        &self,
        on_read: impl Fn(i64) -> FleetResult<()> + Send + Sync + 'static,
    ) -> ReminderStatusUpdater {
        ReminderStatusUpdater::new(
            Arc::new(self.reminders.clone()),
            Arc::new(self.schedules.clone()),
            Arc::new(ScriptedVehicles {
                inner: self.vehicles.clone(),
                on_read: Box::new(on_read),
            }),
        )
    }
}

#[tokio::test]
async fn test_pass_classifies_and_persists() -> Result<()> {
    let f = fixture();

    let report = f
        .updater
        .update_all_reminder_statuses_at(utc(2025, 6, 18), &CancellationSignal::never())
        .await?;
    assert_eq!(report.examined, 2);
    assert_eq!(report.updated, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.started_at, utc(2025, 6, 18));

    let mileage = f.reminders.get(10).unwrap();
    assert_eq!(mileage.status, ReminderStatus::DueSoon);
    assert_eq!(mileage.current_mileage, 14600.0);
    assert_eq!(mileage.mileage_variance, Some(400.0));
    assert_eq!(mileage.days_until_due, None);

    let time = f.reminders.get(11).unwrap();
    assert_eq!(time.status, ReminderStatus::DueSoon);
    assert_eq!(time.due, DuePoint::Date(utc(2025, 7, 1)));
    assert_eq!(time.days_until_due, Some(13));
    assert_eq!(time.mileage_variance, None);
    Ok(())
}

#[tokio::test]
async fn test_overdue_on_due_point() -> Result<()> {
    let f = fixture();
    f.vehicles.set_mileage(1, 15000.0);

    f.updater
        .update_all_reminder_statuses_at(utc(2025, 7, 1), &CancellationSignal::never())
        .await?;

    assert_eq!(f.reminders.get(10).unwrap().status, ReminderStatus::Overdue);
    assert_eq!(f.reminders.get(11).unwrap().status, ReminderStatus::Overdue);
    assert_eq!(f.reminders.get(11).unwrap().days_until_due, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_second_immediate_pass_writes_nothing() -> Result<()> {
    let f = fixture();
    let now = utc(2025, 6, 18);

    let first = f
        .updater
        .update_all_reminder_statuses_at(now, &CancellationSignal::never())
        .await?;
    assert_eq!(first.updated, 2);
    assert_eq!(f.reminders.save_calls(), 1);
    let snapshot = f.reminders.all();

    let second = f
        .updater
        .update_all_reminder_statuses_at(now, &CancellationSignal::never())
        .await?;
    assert_eq!(second.examined, 2);
    assert_eq!(second.updated, 0);
    assert_eq!(f.reminders.save_calls(), 1);
    assert_eq!(f.reminders.all(), snapshot);
    Ok(())
}

#[tokio::test]
async fn test_persistence_failure_leaves_statuses_unchanged() -> Result<()> {
    let f = fixture();
    let before = f.reminders.all();
    f.reminders.fail_saves(true);

    let result = f
        .updater
        .update_all_reminder_statuses_at(utc(2025, 9, 1), &CancellationSignal::never())
        .await;

    match result {
        Err(e) => assert!(e.is_retryable()),
        Ok(report) => panic!("pass should fail, got {report:?}"),
    }
    assert_eq!(f.reminders.all(), before);

    f.reminders.fail_saves(false);
    let report = f
        .updater
        .update_all_reminder_statuses_at(utc(2025, 9, 1), &CancellationSignal::never())
        .await?;
    assert_eq!(report.updated, 2);
    Ok(())
}

#[tokio::test]
async fn test_terminal_reminders_are_never_touched() -> Result<()> {
    let f = fixture();
    let schedule = f.schedules.get(1).unwrap();
    for (id, status) in [(20, ReminderStatus::Completed), (21, ReminderStatus::Cancelled)] {
        f.reminders.insert(
            ReminderBuilder::for_schedule(&schedule)
                .with_id(id)
                .with_vehicle(1)
                .with_status(status)
                .build(),
        );
    }
    let completed_before = f.reminders.get(20).unwrap();
    let cancelled_before = f.reminders.get(21).unwrap();
    f.vehicles.set_mileage(1, 99999.0);

    let report = f
        .updater
        .update_all_reminder_statuses_at(utc(2030, 1, 1), &CancellationSignal::never())
        .await?;
    assert_eq!(report.examined, 2);

    assert_eq!(f.reminders.get(20).unwrap(), completed_before);
    assert_eq!(f.reminders.get(21).unwrap(), cancelled_before);
    Ok(())
}

#[tokio::test]
async fn test_cancellation_discards_staged_updates() -> Result<()> {
    let f = fixture();
    let before = f.reminders.all();
    let source = CancellationSource::new();
    let signal = source.signal();
    source.cancel();

    let result = f
        .updater
        .update_all_reminder_statuses_at(utc(2025, 9, 1), &signal)
        .await;
    assert!(matches!(result, Err(FleetError::Cancelled)));
    assert_eq!(f.reminders.save_calls(), 0);
    assert_eq!(f.reminders.all(), before);
    Ok(())
}

#[tokio::test]
async fn test_cancellation_mid_pass_discards_staged_updates() -> Result<()> {
    let f = fixture();
    let before = f.reminders.all();
    let source = Arc::new(CancellationSource::new());
    let signal = source.signal();

    // 第一条提醒已经暂存后才收到取消信号
    let trigger = source.clone();
    let updater = f.scripted_updater(move |_| {
        trigger.cancel();
        Ok(())
    });

    let result = updater
        .update_all_reminder_statuses_at(utc(2025, 9, 1), &signal)
        .await;
    assert!(matches!(result, Err(FleetError::Cancelled)));
    assert_eq!(f.reminders.save_calls(), 0);
    assert_eq!(f.reminders.all(), before);
    Ok(())
}

#[tokio::test]
async fn test_reminder_completed_during_pass_is_not_counted() -> Result<()> {
    let f = fixture();
    let reminders = f.reminders.clone();
    let updater = f.scripted_updater(move |_| {
        reminders.force_status(11, ReminderStatus::Completed);
        Ok(())
    });

    let report = updater
        .update_all_reminder_statuses_at(utc(2025, 6, 18), &CancellationSignal::never())
        .await?;
    assert_eq!(report.examined, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(f.reminders.get(10).unwrap().status, ReminderStatus::DueSoon);

    let completed = f.reminders.get(11).unwrap();
    assert_eq!(completed.status, ReminderStatus::Completed);
    assert_eq!(completed.days_until_due, None);
    Ok(())
}

#[tokio::test]
async fn test_vehicle_load_failure_skips_only_that_reminder() -> Result<()> {
    let f = fixture();
    let schedule = f.schedules.get(1).unwrap();
    f.reminders.insert(
        ReminderBuilder::for_schedule(&schedule)
            .with_id(50)
            .with_vehicle(2)
            .build(),
    );
    let updater = f.scripted_updater(|vehicle_id| match vehicle_id {
        2 => Err(FleetError::database_error("database is locked")),
        _ => Ok(()),
    });

    let report = updater
        .update_all_reminder_statuses_at(utc(2025, 6, 18), &CancellationSignal::never())
        .await?;
    assert_eq!(report.examined, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.updated, 2);
    assert_eq!(f.reminders.get(50).unwrap().status, ReminderStatus::Upcoming);
    assert_eq!(f.reminders.get(50).unwrap().current_mileage, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_missing_references_are_skipped() -> Result<()> {
    let f = fixture();
    let orphan_schedule = ScheduleBuilder::mileage(1000.0, None, 0.0).with_id(99).build();
    f.reminders.insert(
        ReminderBuilder::for_schedule(&orphan_schedule)
            .with_id(30)
            .with_vehicle(1)
            .build(),
    );
    let schedule = f.schedules.get(1).unwrap();
    f.reminders.insert(
        ReminderBuilder::for_schedule(&schedule)
            .with_id(31)
            .with_vehicle(404)
            .build(),
    );

    let report = f
        .updater
        .update_all_reminder_statuses_at(utc(2025, 6, 18), &CancellationSignal::never())
        .await?;
    assert_eq!(report.examined, 4);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.updated, 2);
    assert_eq!(f.reminders.get(30).unwrap().status, ReminderStatus::Upcoming);
    assert_eq!(f.reminders.get(31).unwrap().status, ReminderStatus::Upcoming);
    assert_eq!(f.reminders.get(10).unwrap().status, ReminderStatus::DueSoon);
    Ok(())
}

#[tokio::test]
async fn test_schedule_lookups_are_cached_per_pass() -> Result<()> {
    let f = fixture();
    let schedule = f.schedules.get(1).unwrap();
    f.reminders.insert(
        ReminderBuilder::for_schedule(&schedule)
            .with_id(40)
            .with_vehicle(2)
            .build(),
    );

    f.updater
        .update_all_reminder_statuses_at(utc(2025, 6, 18), &CancellationSignal::never())
        .await?;
    assert_eq!(f.schedules.lookup_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_interval_edit_moves_due_point() -> Result<()> {
    let f = fixture();
    let mut schedule = f.schedules.get(1).unwrap();
    schedule.rule = ScheduleRule::mileage(8000.0, Some(500.0), 10000.0)?;
    f.schedules.insert(schedule);

    f.updater
        .update_all_reminder_statuses_at(utc(2025, 1, 1), &CancellationSignal::never())
        .await?;

    let reminder = f.reminders.get(10).unwrap();
    assert_eq!(reminder.due, DuePoint::Mileage(18000.0));
    assert_eq!(reminder.status, ReminderStatus::Upcoming);
    assert_eq!(reminder.mileage_variance, Some(3400.0));
    Ok(())
}
