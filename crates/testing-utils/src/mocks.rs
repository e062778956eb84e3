//! In-memory mock implementations of the repository traits
//!
//! The reminder mock mirrors the SQLite semantics that the status updater
//! depends on: batch saves are all-or-nothing and never overwrite a reminder
//! that has reached a terminal status.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use fleet_core::{FleetError, FleetResult};
use fleet_domain::entities::{
    ReminderStatus, ServiceProgram, ServiceReminder, ServiceSchedule, ServiceTask, Vehicle,
};
use fleet_domain::repositories::{
    ServiceProgramRepository, ServiceReminderRepository, ServiceScheduleRepository,
    ServiceTaskRepository, VehicleRepository,
};

/// Mock implementation of VehicleRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockVehicleRepository {
    vehicles: Arc<Mutex<HashMap<i64, Vehicle>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockVehicleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicles(vehicles: Vec<Vehicle>) -> Self {
        let repo = Self::new();
        for vehicle in vehicles {
            repo.insert(vehicle);
        }
        repo
    }

    /// Insert a vehicle keeping its id
    pub fn insert(&self, vehicle: Vehicle) {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id = (*next_id).max(vehicle.id);
        self.vehicles.lock().unwrap().insert(vehicle.id, vehicle);
    }

    pub fn remove(&self, id: i64) {
        self.vehicles.lock().unwrap().remove(&id);
    }

    pub fn set_mileage(&self, id: i64, mileage: f64) {
        if let Some(vehicle) = self.vehicles.lock().unwrap().get_mut(&id) {
            vehicle.current_mileage = mileage;
        }
    }
}

#[async_trait]
impl VehicleRepository for MockVehicleRepository {
    async fn create(&self, vehicle: &Vehicle) -> FleetResult<Vehicle> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;

        let mut created = vehicle.clone();
        created.id = *next_id;
        self.vehicles
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Vehicle>> {
        Ok(self.vehicles.lock().unwrap().get(&id).cloned())
    }

    async fn get_current_mileage(&self, vehicle_id: i64) -> FleetResult<f64> {
        self.vehicles
            .lock()
            .unwrap()
            .get(&vehicle_id)
            .map(|v| v.current_mileage)
            .ok_or(FleetError::VehicleNotFound { id: vehicle_id })
    }

    async fn update_mileage(&self, vehicle_id: i64, mileage: f64) -> FleetResult<()> {
        let mut vehicles = self.vehicles.lock().unwrap();
        let vehicle = vehicles
            .get_mut(&vehicle_id)
            .ok_or(FleetError::VehicleNotFound { id: vehicle_id })?;
        vehicle.current_mileage = mileage;
        Ok(())
    }
}

/// Mock implementation of ServiceProgramRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockServiceProgramRepository {
    programs: Arc<Mutex<HashMap<i64, ServiceProgram>>>,
    enrollments: Arc<Mutex<HashSet<(i64, i64)>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockServiceProgramRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, program: ServiceProgram) {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id = (*next_id).max(program.id);
        self.programs.lock().unwrap().insert(program.id, program);
    }

    pub fn is_enrolled(&self, program_id: i64, vehicle_id: i64) -> bool {
        self.enrollments
            .lock()
            .unwrap()
            .contains(&(program_id, vehicle_id))
    }
}

#[async_trait]
impl ServiceProgramRepository for MockServiceProgramRepository {
    async fn create(&self, program: &ServiceProgram) -> FleetResult<ServiceProgram> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;

        let mut created = program.clone();
        created.id = *next_id;
        self.programs
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceProgram>> {
        Ok(self.programs.lock().unwrap().get(&id).cloned())
    }

    async fn enroll_vehicle(&self, program_id: i64, vehicle_id: i64) -> FleetResult<bool> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .insert((program_id, vehicle_id)))
    }

    async fn unenroll_vehicle(&self, program_id: i64, vehicle_id: i64) -> FleetResult<bool> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .remove(&(program_id, vehicle_id)))
    }
}

/// Mock implementation of ServiceTaskRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockServiceTaskRepository {
    tasks: Arc<Mutex<HashMap<i64, ServiceTask>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockServiceTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServiceTaskRepository for MockServiceTaskRepository {
    async fn create(&self, task: &ServiceTask) -> FleetResult<ServiceTask> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;

        let mut created = task.clone();
        created.id = *next_id;
        self.tasks.lock().unwrap().insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceTask>> {
        Ok(self.tasks.lock().unwrap().get(&id).cloned())
    }
}

/// Mock implementation of ServiceScheduleRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockServiceScheduleRepository {
    schedules: Arc<Mutex<HashMap<i64, ServiceSchedule>>>,
    next_id: Arc<Mutex<i64>>,
    lookups: Arc<AtomicUsize>,
}

impl MockServiceScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedules(schedules: Vec<ServiceSchedule>) -> Self {
        let repo = Self::new();
        for schedule in schedules {
            repo.insert(schedule);
        }
        repo
    }

    /// Insert or replace a schedule keeping its id
    pub fn insert(&self, schedule: ServiceSchedule) {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id = (*next_id).max(schedule.id);
        self.schedules.lock().unwrap().insert(schedule.id, schedule);
    }

    pub fn remove(&self, id: i64) {
        self.schedules.lock().unwrap().remove(&id);
    }

    pub fn get(&self, id: i64) -> Option<ServiceSchedule> {
        self.schedules.lock().unwrap().get(&id).cloned()
    }

    /// Number of `get_by_id` calls served so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceScheduleRepository for MockServiceScheduleRepository {
    async fn create(&self, schedule: &ServiceSchedule) -> FleetResult<ServiceSchedule> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;

        let mut created = schedule.clone();
        created.id = *next_id;
        self.schedules
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceSchedule>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.schedules.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_program(&self, program_id: i64) -> FleetResult<Vec<ServiceSchedule>> {
        let mut schedules: Vec<ServiceSchedule> = self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.service_program_id == program_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.id);
        Ok(schedules)
    }

    async fn update(&self, schedule: &ServiceSchedule) -> FleetResult<()> {
        let mut schedules = self.schedules.lock().unwrap();
        if !schedules.contains_key(&schedule.id) {
            return Err(FleetError::ScheduleNotFound { id: schedule.id });
        }
        schedules.insert(schedule.id, schedule.clone());
        Ok(())
    }
}

/// Mock implementation of ServiceReminderRepository for testing
#[derive(Debug, Clone, Default)]
pub struct MockServiceReminderRepository {
    reminders: Arc<Mutex<HashMap<i64, ServiceReminder>>>,
    next_id: Arc<Mutex<i64>>,
    fail_saves: Arc<AtomicBool>,
    save_calls: Arc<AtomicUsize>,
}

impl MockServiceReminderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reminders(reminders: Vec<ServiceReminder>) -> Self {
        let repo = Self::new();
        for reminder in reminders {
            repo.insert(reminder);
        }
        repo
    }

    /// Insert or replace a reminder keeping its id
    pub fn insert(&self, reminder: ServiceReminder) {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id = (*next_id).max(reminder.id);
        self.reminders.lock().unwrap().insert(reminder.id, reminder);
    }

    /// Make every following batch save fail without writing anything
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Change a stored status directly, simulating a concurrent writer
    pub fn force_status(&self, id: i64, status: ReminderStatus) {
        if let Some(reminder) = self.reminders.lock().unwrap().get_mut(&id) {
            reminder.status = status;
        }
    }

    pub fn get(&self, id: i64) -> Option<ServiceReminder> {
        self.reminders.lock().unwrap().get(&id).cloned()
    }

    pub fn all(&self) -> Vec<ServiceReminder> {
        let mut reminders: Vec<ServiceReminder> =
            self.reminders.lock().unwrap().values().cloned().collect();
        reminders.sort_by_key(|r| r.id);
        reminders
    }

    /// Same guard as the SQL `WHERE status IN (open)` updates
    fn open_entry<'a>(
        reminders: &'a mut HashMap<i64, ServiceReminder>,
        id: i64,
        action: &str,
    ) -> FleetResult<&'a mut ServiceReminder> {
        let stored = reminders
            .get_mut(&id)
            .ok_or(FleetError::ReminderNotFound { id })?;
        if !stored.is_open() {
            return Err(FleetError::invalid_transition(id, stored.status, action));
        }
        Ok(stored)
    }

    fn insert_new(
        reminders: &mut HashMap<i64, ServiceReminder>,
        next_id: &mut i64,
        reminder: &ServiceReminder,
    ) -> ServiceReminder {
        *next_id += 1;
        let mut created = reminder.clone();
        created.id = *next_id;
        reminders.insert(created.id, created.clone());
        created
    }
}

#[async_trait]
impl ServiceReminderRepository for MockServiceReminderRepository {
    async fn create(&self, reminder: &ServiceReminder) -> FleetResult<ServiceReminder> {
        let mut next_id = self.next_id.lock().unwrap();
        let mut reminders = self.reminders.lock().unwrap();
        Ok(Self::insert_new(&mut reminders, &mut next_id, reminder))
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceReminder>> {
        Ok(self.get(id))
    }

    async fn get_open_reminders(&self) -> FleetResult<Vec<ServiceReminder>> {
        Ok(self.all().into_iter().filter(|r| r.is_open()).collect())
    }

    async fn get_open_by_vehicle(&self, vehicle_id: i64) -> FleetResult<Vec<ServiceReminder>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|r| r.is_open() && r.vehicle_id == vehicle_id)
            .collect())
    }

    async fn link_work_order(
        &self,
        reminder_id: i64,
        work_order_id: i64,
    ) -> FleetResult<ServiceReminder> {
        let mut reminders = self.reminders.lock().unwrap();
        let stored = Self::open_entry(&mut reminders, reminder_id, "link work order")?;
        stored.work_order_id = Some(work_order_id);
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn cancel(&self, reminder_id: i64) -> FleetResult<ServiceReminder> {
        let mut reminders = self.reminders.lock().unwrap();
        let stored = Self::open_entry(&mut reminders, reminder_id, "cancel")?;
        stored.status = ReminderStatus::Cancelled;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn save_reminder_updates(&self, updates: &[ServiceReminder]) -> FleetResult<Vec<i64>> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(FleetError::database_error("模拟的批量保存失败"));
        }

        let mut reminders = self.reminders.lock().unwrap();
        let mut written = Vec::new();
        for update in updates {
            if let Some(stored) = reminders.get_mut(&update.id) {
                if stored.is_open() {
                    stored.status = update.status;
                    stored.due = update.due;
                    stored.current_mileage = update.current_mileage;
                    stored.mileage_variance = update.mileage_variance;
                    stored.days_until_due = update.days_until_due;
                    stored.updated_at = update.updated_at;
                    written.push(update.id);
                }
            }
        }
        Ok(written)
    }

    async fn complete_and_schedule_next(
        &self,
        completed: &ServiceReminder,
        next: Option<&ServiceReminder>,
    ) -> FleetResult<Option<ServiceReminder>> {
        let mut next_id = self.next_id.lock().unwrap();
        let mut reminders = self.reminders.lock().unwrap();

        let stored = Self::open_entry(&mut reminders, completed.id, "complete")?;

        stored.status = ReminderStatus::Completed;
        stored.work_order_id = completed.work_order_id;
        stored.completed_at = completed.completed_at;
        stored.completion_mileage = completed.completion_mileage;
        stored.updated_at = completed.updated_at;

        Ok(next.map(|next| Self::insert_new(&mut reminders, &mut next_id, next)))
    }
}
