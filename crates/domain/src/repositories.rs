//! 领域仓储抽象
//!
//! 状态更新批次通过这些接口访问持久化层，不依赖具体的数据库实现。

use async_trait::async_trait;
use fleet_core::FleetResult;

use crate::entities::{ServiceProgram, ServiceReminder, ServiceSchedule, ServiceTask, Vehicle};

/// 车辆仓储抽象
#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn create(&self, vehicle: &Vehicle) -> FleetResult<Vehicle>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Vehicle>>;
    /// 车辆不存在时返回 `VehicleNotFound`
    async fn get_current_mileage(&self, vehicle_id: i64) -> FleetResult<f64>;
    async fn update_mileage(&self, vehicle_id: i64, mileage: f64) -> FleetResult<()>;
}

/// 保养方案仓储抽象
#[async_trait]
pub trait ServiceProgramRepository: Send + Sync {
    async fn create(&self, program: &ServiceProgram) -> FleetResult<ServiceProgram>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceProgram>>;
    /// 记录车辆加入方案，已加入时返回 false
    async fn enroll_vehicle(&self, program_id: i64, vehicle_id: i64) -> FleetResult<bool>;
    /// 移除车辆与方案的关联，未加入时返回 false
    async fn unenroll_vehicle(&self, program_id: i64, vehicle_id: i64) -> FleetResult<bool>;
}

/// 保养任务仓储抽象
#[async_trait]
pub trait ServiceTaskRepository: Send + Sync {
    async fn create(&self, task: &ServiceTask) -> FleetResult<ServiceTask>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceTask>>;
}

/// 保养计划仓储抽象
#[async_trait]
pub trait ServiceScheduleRepository: Send + Sync {
    async fn create(&self, schedule: &ServiceSchedule) -> FleetResult<ServiceSchedule>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceSchedule>>;
    async fn get_by_program(&self, program_id: i64) -> FleetResult<Vec<ServiceSchedule>>;
    async fn update(&self, schedule: &ServiceSchedule) -> FleetResult<()>;
}

/// 保养提醒仓储抽象
#[async_trait]
pub trait ServiceReminderRepository: Send + Sync {
    async fn create(&self, reminder: &ServiceReminder) -> FleetResult<ServiceReminder>;
    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceReminder>>;
    /// 所有非终态（Upcoming/DueSoon/Overdue）的提醒
    async fn get_open_reminders(&self) -> FleetResult<Vec<ServiceReminder>>;
    async fn get_open_by_vehicle(&self, vehicle_id: i64) -> FleetResult<Vec<ServiceReminder>>;
    /// 为未完成的提醒关联工单，提醒已进入终态时返回 InvalidStateTransition
    async fn link_work_order(
        &self,
        reminder_id: i64,
        work_order_id: i64,
    ) -> FleetResult<ServiceReminder>;
    /// 取消未完成的提醒，提醒已进入终态时返回 InvalidStateTransition
    async fn cancel(&self, reminder_id: i64) -> FleetResult<ServiceReminder>;
    /// 在单个事务中保存一批提醒的变更，任何一条失败则整批回滚
    ///
    /// 保存期间已进入终态的提醒会被跳过，返回实际写入的提醒 ID。
    async fn save_reminder_updates(&self, reminders: &[ServiceReminder]) -> FleetResult<Vec<i64>>;
    /// 在单个事务中保存已完成的提醒并插入下一周期的提醒
    async fn complete_and_schedule_next(
        &self,
        completed: &ServiceReminder,
        next: Option<&ServiceReminder>,
    ) -> FleetResult<Option<ServiceReminder>>;
}
