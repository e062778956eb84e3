//! Test data builders for creating test entities
//!
//! Builders start from sensible defaults so tests only spell out the fields
//! they care about.

use chrono::{DateTime, Utc};
use fleet_domain::entities::{ReminderStatus, ServiceReminder, ServiceSchedule, Vehicle};
use fleet_domain::value_objects::{DuePoint, ScheduleRule, TimeInterval, TimeUnit};

use crate::helpers::utc;

/// Builder for creating test Vehicle entities
pub struct VehicleBuilder {
    vehicle: Vehicle,
}

impl VehicleBuilder {
    pub fn new() -> Self {
        let mut vehicle = Vehicle::new("测试车辆".to_string(), "VIN-TEST-0001".to_string(), 0.0);
        vehicle.id = 1;
        Self { vehicle }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.vehicle.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.vehicle.name = name.to_string();
        self
    }

    pub fn with_vin(mut self, vin: &str) -> Self {
        self.vehicle.vin = vin.to_string();
        self
    }

    pub fn with_mileage(mut self, mileage: f64) -> Self {
        self.vehicle.current_mileage = mileage;
        self
    }

    pub fn build(self) -> Vehicle {
        self.vehicle
    }
}

impl Default for VehicleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test ServiceSchedule entities
///
/// Defaults to a mileage schedule of 5000 with a 500 buffer starting at 10000.
pub struct ScheduleBuilder {
    schedule: ServiceSchedule,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        let mut schedule = ServiceSchedule::new(
            1,
            "测试保养计划".to_string(),
            ScheduleRule::Mileage {
                interval: 5000.0,
                buffer: Some(500.0),
                first_service_mileage: 10000.0,
            },
        );
        schedule.id = 1;
        Self { schedule }
    }

    /// Mileage schedule; panics on invalid values
    pub fn mileage(interval: f64, buffer: Option<f64>, first_service_mileage: f64) -> Self {
        let rule = ScheduleRule::mileage(interval, buffer, first_service_mileage)
            .expect("invalid mileage rule in test");
        Self::new().with_rule(rule)
    }

    /// Time schedule; panics on non-positive intervals
    pub fn time(
        interval: (i64, TimeUnit),
        buffer: Option<(i64, TimeUnit)>,
        first_service_date: DateTime<Utc>,
    ) -> Self {
        let interval =
            TimeInterval::new(interval.0, interval.1).expect("invalid time interval in test");
        let buffer = buffer
            .map(|(value, unit)| TimeInterval::new(value, unit).expect("invalid buffer in test"));
        Self::new().with_rule(ScheduleRule::time(interval, buffer, first_service_date))
    }

    /// Six months with a two-week buffer starting 2025-01-01
    pub fn half_yearly() -> Self {
        Self::time(
            (6, TimeUnit::Months),
            Some((2, TimeUnit::Weeks)),
            utc(2025, 1, 1),
        )
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.schedule.id = id;
        self
    }

    pub fn with_program(mut self, program_id: i64) -> Self {
        self.schedule.service_program_id = program_id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.schedule.name = name.to_string();
        self
    }

    pub fn with_rule(mut self, rule: ScheduleRule) -> Self {
        self.schedule.rule = rule;
        self
    }

    pub fn with_tasks(mut self, task_ids: Vec<i64>) -> Self {
        self.schedule.service_task_ids = task_ids;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.schedule.is_active = false;
        self
    }

    pub fn build(self) -> ServiceSchedule {
        self.schedule
    }
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test ServiceReminder entities
pub struct ReminderBuilder {
    reminder: ServiceReminder,
}

impl ReminderBuilder {
    /// First-cycle reminder for the given schedule
    pub fn for_schedule(schedule: &ServiceSchedule) -> Self {
        let mut reminder = ServiceReminder::new(1, schedule, schedule.rule.first_anchor(), 0.0)
            .expect("schedule anchor always matches its own rule");
        reminder.id = 1;
        Self { reminder }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.reminder.id = id;
        self
    }

    pub fn with_vehicle(mut self, vehicle_id: i64) -> Self {
        self.reminder.vehicle_id = vehicle_id;
        self
    }

    pub fn with_status(mut self, status: ReminderStatus) -> Self {
        self.reminder.status = status;
        self
    }

    /// Replace the anchor without recomputing the due point
    pub fn with_anchor(mut self, anchor: DuePoint) -> Self {
        self.reminder.anchor = anchor;
        self
    }

    pub fn with_current_mileage(mut self, mileage: f64) -> Self {
        self.reminder.current_mileage = mileage;
        self
    }

    pub fn with_work_order(mut self, work_order_id: i64) -> Self {
        self.reminder.work_order_id = Some(work_order_id);
        self
    }

    pub fn build(self) -> ServiceReminder {
        self.reminder
    }
}
