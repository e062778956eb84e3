use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_core::{AppConfig, CancellationSignal};
use fleet_infrastructure::{init_metrics, DatabaseManager};
use fleet_reminders::{
    EnrollmentService, ReminderCompletionService, ReminderStatusTrigger, ReminderStatusUpdater,
    StatusUpdateReport, StatusUpdaterService,
};
use tracing::info;

/// 主应用程序：数据库、状态更新器与后台触发器
pub struct Application {
    config: AppConfig,
    database: DatabaseManager,
    updater: Arc<ReminderStatusUpdater>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let database = DatabaseManager::new(&config.database)
            .await
            .context("初始化数据库失败")?;

        if config.observability.metrics_enabled {
            init_metrics(&config.observability.metrics_bind_address)?;
            info!(
                "Prometheus指标已在 {} 暴露",
                config.observability.metrics_bind_address
            );
        }

        let updater = Arc::new(ReminderStatusUpdater::new(
            database.service_reminder_repository(),
            database.service_schedule_repository(),
            database.vehicle_repository(),
        ));

        Ok(Self {
            config,
            database,
            updater,
        })
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.database
    }

    pub fn enrollment_service(&self) -> EnrollmentService {
        EnrollmentService::new(
            self.database.vehicle_repository(),
            self.database.service_program_repository(),
            self.database.service_schedule_repository(),
            self.database.service_reminder_repository(),
        )
    }

    pub fn completion_service(&self) -> ReminderCompletionService {
        ReminderCompletionService::new(
            self.database.service_reminder_repository(),
            self.database.service_schedule_repository(),
        )
    }

    /// 立即执行一次状态更新批次
    pub async fn run_once(&self) -> Result<StatusUpdateReport> {
        let report = self
            .updater
            .update_all_reminder_statuses(&CancellationSignal::never())
            .await?;
        Ok(report)
    }

    /// 运行后台触发器，直到收到关闭信号
    pub async fn run(&self, mut shutdown: CancellationSignal) -> Result<()> {
        let trigger =
            ReminderStatusTrigger::new(self.updater.clone(), self.config.reminder_updater.clone());
        trigger.run(shutdown.clone()).await;

        // 触发器被禁用时立即返回，仍然等到关闭信号再释放数据库
        shutdown.cancelled().await;

        self.database.close().await;
        info!("数据库连接已关闭");
        Ok(())
    }
}
