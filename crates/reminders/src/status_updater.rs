//! 保养提醒状态批量更新
//!
//! 一次批次：读取所有未完成的提醒，以批次开始时捕获的时间和车辆里程快照重新计算
//! 到期点与状态，把有变化的提醒暂存起来，最后在一个事务中统一写回。
//! 单条提醒的关联数据加载失败只跳过该提醒；取消信号会丢弃所有暂存的变更。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_core::{CancellationSignal, FleetError, FleetResult};
use fleet_domain::entities::{ServiceReminder, ServiceSchedule};
use fleet_domain::repositories::{
    ServiceReminderRepository, ServiceScheduleRepository, VehicleRepository,
};
use fleet_domain::services::{apply_evaluation, evaluate_reminder, VehicleReading};
use fleet_infrastructure::{MetricsCollector, StructuredLogger};
use tracing::{debug, info, instrument};

/// 一次批次的执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdateReport {
    pub started_at: DateTime<Utc>,
    /// 读取到的未完成提醒数量
    pub examined: usize,
    /// 实际写入数据库的提醒数量
    pub updated: usize,
    /// 因关联数据加载失败而跳过的提醒数量
    pub skipped: usize,
}

/// 提醒状态更新服务接口
#[async_trait]
pub trait StatusUpdaterService: Send + Sync {
    async fn update_all_reminder_statuses(
        &self,
        cancel: &CancellationSignal,
    ) -> FleetResult<StatusUpdateReport>;
}

/// 批次内的查询缓存，同一计划或车辆只读取一次
#[derive(Default)]
struct PassCache {
    schedules: HashMap<i64, Option<ServiceSchedule>>,
    mileages: HashMap<i64, f64>,
}

pub struct ReminderStatusUpdater {
    reminder_repo: Arc<dyn ServiceReminderRepository>,
    schedule_repo: Arc<dyn ServiceScheduleRepository>,
    vehicle_repo: Arc<dyn VehicleRepository>,
    metrics: MetricsCollector,
}

impl ReminderStatusUpdater {
    pub fn new(
        reminder_repo: Arc<dyn ServiceReminderRepository>,
        schedule_repo: Arc<dyn ServiceScheduleRepository>,
        vehicle_repo: Arc<dyn VehicleRepository>,
    ) -> Self {
        Self {
            reminder_repo,
            schedule_repo,
            vehicle_repo,
            metrics: MetricsCollector::new(),
        }
    }

    /// 以指定的"当前时间"执行一次批次
    #[instrument(skip(self, cancel))]
    pub async fn update_all_reminder_statuses_at(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationSignal,
    ) -> FleetResult<StatusUpdateReport> {
        let timer = Instant::now();
        let result = self.run_pass(now, cancel).await;
        let elapsed = timer.elapsed();

        match &result {
            Ok(report) => {
                self.metrics.record_pass(
                    report.examined,
                    report.updated,
                    report.skipped,
                    elapsed.as_secs_f64(),
                );
                StructuredLogger::log_status_pass_completed(
                    now,
                    report.examined,
                    report.updated,
                    report.skipped,
                    elapsed.as_millis() as u64,
                );
            }
            Err(FleetError::Cancelled) => {
                info!("状态更新批次已取消，暂存的变更已丢弃");
            }
            Err(e) => {
                self.metrics.record_pass_failure(elapsed.as_secs_f64());
                StructuredLogger::log_status_pass_failed(now, &e.to_string(), e.is_retryable());
            }
        }

        result
    }

    async fn run_pass(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationSignal,
    ) -> FleetResult<StatusUpdateReport> {
        let reminders = self.reminder_repo.get_open_reminders().await?;
        debug!("读取到 {} 条未完成的提醒", reminders.len());

        let mut cache = PassCache::default();
        let mut staged = Vec::new();
        let mut previous_statuses = HashMap::new();
        let mut skipped = 0;
        let examined = reminders.len();

        for mut reminder in reminders {
            if cancel.is_cancelled() {
                return Err(FleetError::Cancelled);
            }

            let previous = reminder.status;
            match self.recompute(&mut cache, &mut reminder, now).await {
                Ok(true) => {
                    if reminder.status != previous {
                        previous_statuses.insert(reminder.id, previous);
                    }
                    staged.push(reminder);
                }
                Ok(false) => {}
                Err(e) => {
                    skipped += 1;
                    StructuredLogger::log_reminder_skipped(&reminder, &e);
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(FleetError::Cancelled);
        }

        let written: HashSet<i64> = if staged.is_empty() {
            HashSet::new()
        } else {
            self.reminder_repo
                .save_reminder_updates(&staged)
                .await?
                .into_iter()
                .collect()
        };

        // 保存时已进入终态的提醒没有写入，不记录状态变化
        for reminder in staged.iter().filter(|r| written.contains(&r.id)) {
            if let Some(previous) = previous_statuses.get(&reminder.id) {
                StructuredLogger::log_reminder_status_changed(reminder, *previous);
            }
        }

        Ok(StatusUpdateReport {
            started_at: now,
            examined,
            updated: written.len(),
            skipped,
        })
    }

    /// 重新计算单条提醒，返回是否需要写回
    async fn recompute(
        &self,
        cache: &mut PassCache,
        reminder: &mut ServiceReminder,
        now: DateTime<Utc>,
    ) -> FleetResult<bool> {
        if reminder.status.is_terminal() {
            return Ok(false);
        }

        let schedule_id = reminder.service_schedule_id;
        if !cache.schedules.contains_key(&schedule_id) {
            let schedule = self.schedule_repo.get_by_id(schedule_id).await?;
            cache.schedules.insert(schedule_id, schedule);
        }
        let schedule = cache
            .schedules
            .get(&schedule_id)
            .and_then(Option::as_ref)
            .ok_or(FleetError::ScheduleNotFound { id: schedule_id })?;

        let current_mileage = match cache.mileages.get(&reminder.vehicle_id) {
            Some(mileage) => *mileage,
            None => {
                let mileage = self
                    .vehicle_repo
                    .get_current_mileage(reminder.vehicle_id)
                    .await?;
                cache.mileages.insert(reminder.vehicle_id, mileage);
                mileage
            }
        };

        let reading = VehicleReading {
            now,
            current_mileage,
        };
        let evaluation = evaluate_reminder(reminder, &schedule.rule, &reading)?;
        Ok(apply_evaluation(reminder, &evaluation))
    }
}

#[async_trait]
impl StatusUpdaterService for ReminderStatusUpdater {
    async fn update_all_reminder_statuses(
        &self,
        cancel: &CancellationSignal,
    ) -> FleetResult<StatusUpdateReport> {
        self.update_all_reminder_statuses_at(Utc::now(), cancel)
            .await
    }
}

