use std::collections::HashSet;
use std::sync::Arc;

use fleet_core::{FleetError, FleetResult};
use fleet_domain::entities::ServiceReminder;
use fleet_domain::repositories::{
    ServiceProgramRepository, ServiceReminderRepository, ServiceScheduleRepository,
    VehicleRepository,
};
use fleet_infrastructure::StructuredLogger;
use tracing::{debug, info, instrument};

/// 车辆加入或退出保养方案
pub struct EnrollmentService {
    vehicle_repo: Arc<dyn VehicleRepository>,
    program_repo: Arc<dyn ServiceProgramRepository>,
    schedule_repo: Arc<dyn ServiceScheduleRepository>,
    reminder_repo: Arc<dyn ServiceReminderRepository>,
}

impl EnrollmentService {
    pub fn new(
        vehicle_repo: Arc<dyn VehicleRepository>,
        program_repo: Arc<dyn ServiceProgramRepository>,
        schedule_repo: Arc<dyn ServiceScheduleRepository>,
        reminder_repo: Arc<dyn ServiceReminderRepository>,
    ) -> Self {
        Self {
            vehicle_repo,
            program_repo,
            schedule_repo,
            reminder_repo,
        }
    }

    /// 车辆加入方案，为每个启用的计划创建首个周期的提醒
    ///
    /// 已经存在未完成提醒的计划不会重复创建。返回新创建的提醒。
    #[instrument(skip(self))]
    pub async fn enroll_vehicle(
        &self,
        vehicle_id: i64,
        program_id: i64,
    ) -> FleetResult<Vec<ServiceReminder>> {
        let vehicle = self
            .vehicle_repo
            .get_by_id(vehicle_id)
            .await?
            .ok_or(FleetError::VehicleNotFound { id: vehicle_id })?;
        self.program_repo
            .get_by_id(program_id)
            .await?
            .ok_or(FleetError::ProgramNotFound { id: program_id })?;

        self.program_repo
            .enroll_vehicle(program_id, vehicle_id)
            .await?;

        let covered: HashSet<i64> = self
            .reminder_repo
            .get_open_by_vehicle(vehicle_id)
            .await?
            .into_iter()
            .map(|r| r.service_schedule_id)
            .collect();

        let mut created = Vec::new();
        for schedule in self.schedule_repo.get_by_program(program_id).await? {
            if !schedule.is_active || covered.contains(&schedule.id) {
                debug!("跳过保养计划 {}: 未启用或已有未完成提醒", schedule.id);
                continue;
            }

            let reminder = ServiceReminder::new(
                vehicle_id,
                &schedule,
                schedule.rule.first_anchor(),
                vehicle.current_mileage,
            )?;
            created.push(self.reminder_repo.create(&reminder).await?);
        }

        info!(
            "{} 加入保养方案 {}, 新建提醒 {} 条",
            vehicle.entity_description(),
            program_id,
            created.len()
        );
        Ok(created)
    }

    /// 车辆退出方案，取消该方案下所有未完成的提醒，返回取消的数量
    #[instrument(skip(self))]
    pub async fn remove_vehicle_from_program(
        &self,
        vehicle_id: i64,
        program_id: i64,
    ) -> FleetResult<usize> {
        self.program_repo
            .get_by_id(program_id)
            .await?
            .ok_or(FleetError::ProgramNotFound { id: program_id })?;

        let schedule_ids: HashSet<i64> = self
            .schedule_repo
            .get_by_program(program_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let mut cancelled = 0;
        for reminder in self.reminder_repo.get_open_by_vehicle(vehicle_id).await? {
            if !schedule_ids.contains(&reminder.service_schedule_id) {
                continue;
            }
            match self.reminder_repo.cancel(reminder.id).await {
                Ok(reminder) => {
                    StructuredLogger::log_reminder_cancelled(
                        &reminder,
                        "vehicle removed from program",
                    );
                    cancelled += 1;
                }
                // 读取之后已被完成或取消
                Err(FleetError::InvalidStateTransition { status, .. }) => {
                    debug!("提醒 {} 已是 {}，无需取消", reminder.id, status);
                }
                Err(e) => return Err(e),
            }
        }

        self.program_repo
            .unenroll_vehicle(program_id, vehicle_id)
            .await?;

        info!(
            "车辆 {} 退出保养方案 {}, 取消提醒 {} 条",
            vehicle_id, program_id, cancelled
        );
        Ok(cancelled)
    }
}
