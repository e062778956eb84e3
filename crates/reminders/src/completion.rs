use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_core::{FleetError, FleetResult};
use fleet_domain::entities::ServiceReminder;
use fleet_domain::repositories::{ServiceReminderRepository, ServiceScheduleRepository};
use fleet_infrastructure::StructuredLogger;
use tracing::{info, instrument, warn};

/// 工单关联、完成与取消等由外部触发的提醒状态变更
pub struct ReminderCompletionService {
    reminder_repo: Arc<dyn ServiceReminderRepository>,
    schedule_repo: Arc<dyn ServiceScheduleRepository>,
}

impl ReminderCompletionService {
    pub fn new(
        reminder_repo: Arc<dyn ServiceReminderRepository>,
        schedule_repo: Arc<dyn ServiceScheduleRepository>,
    ) -> Self {
        Self {
            reminder_repo,
            schedule_repo,
        }
    }

    async fn load(&self, reminder_id: i64) -> FleetResult<ServiceReminder> {
        self.reminder_repo
            .get_by_id(reminder_id)
            .await?
            .ok_or(FleetError::ReminderNotFound { id: reminder_id })
    }

    /// 开始施工时关联工单，状态不变
    pub async fn link_work_order(
        &self,
        reminder_id: i64,
        work_order_id: i64,
    ) -> FleetResult<ServiceReminder> {
        self.load(reminder_id).await?.link_work_order(work_order_id)?;
        // 读取之后提醒可能已被完成，由仓储的条件更新兜底
        let linked = self
            .reminder_repo
            .link_work_order(reminder_id, work_order_id)
            .await?;

        info!("提醒 {} 已关联工单 {}", reminder_id, work_order_id);
        Ok(linked)
    }

    /// 工单完成：提醒进入 Completed，并以完成日期或完成里程为基准创建下一周期的提醒
    ///
    /// 计划已停用或已删除时不再创建下一周期。返回新创建的提醒。
    #[instrument(skip(self))]
    pub async fn complete_reminder(
        &self,
        reminder_id: i64,
        work_order_id: i64,
        completed_at: DateTime<Utc>,
        completion_mileage: f64,
    ) -> FleetResult<Option<ServiceReminder>> {
        if !completion_mileage.is_finite() || completion_mileage < 0.0 {
            return Err(FleetError::invalid_argument(format!(
                "完成里程无效: {completion_mileage}"
            )));
        }

        let mut reminder = self.load(reminder_id).await?;
        reminder.mark_completed(work_order_id, completed_at, completion_mileage)?;

        let next = match self
            .schedule_repo
            .get_by_id(reminder.service_schedule_id)
            .await?
        {
            Some(schedule) if schedule.is_active => {
                let anchor = schedule
                    .rule
                    .completion_anchor(completed_at, completion_mileage);
                Some(ServiceReminder::new(
                    reminder.vehicle_id,
                    &schedule,
                    anchor,
                    completion_mileage,
                )?)
            }
            Some(_) => None,
            None => {
                warn!(
                    "提醒 {} 的保养计划 {} 不存在，不创建下一周期",
                    reminder_id, reminder.service_schedule_id
                );
                None
            }
        };

        let created = self
            .reminder_repo
            .complete_and_schedule_next(&reminder, next.as_ref())
            .await?;

        StructuredLogger::log_reminder_completed(&reminder, created.as_ref());
        Ok(created)
    }

    /// 管理员取消提醒
    pub async fn cancel_reminder(&self, reminder_id: i64) -> FleetResult<ServiceReminder> {
        self.load(reminder_id).await?.cancel()?;
        let cancelled = self.reminder_repo.cancel(reminder_id).await?;

        StructuredLogger::log_reminder_cancelled(&cancelled, "cancelled by request");
        Ok(cancelled)
    }
}
