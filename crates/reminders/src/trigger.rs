use std::sync::Arc;
use std::time::Duration;

use fleet_core::{CancellationSignal, FleetError, ReminderUpdaterConfig};
use tracing::{error, info, warn};

use crate::status_updater::StatusUpdaterService;

/// 提醒状态更新的后台触发器
///
/// 每次批次结束后才开始计时等待下一次执行，批次之间不会重叠。
/// 成功后等待 `update_interval`，失败后等待 `retry_delay`。
pub struct ReminderStatusTrigger {
    updater: Arc<dyn StatusUpdaterService>,
    config: ReminderUpdaterConfig,
}

impl ReminderStatusTrigger {
    pub fn new(updater: Arc<dyn StatusUpdaterService>, config: ReminderUpdaterConfig) -> Self {
        Self { updater, config }
    }

    /// 运行触发循环，直到收到取消信号
    pub async fn run(&self, mut cancel: CancellationSignal) {
        if !self.config.enabled {
            info!("提醒状态更新已禁用，不启动后台触发器");
            return;
        }

        info!(
            "启动提醒状态更新触发器, 间隔: {:?}, 失败重试延迟: {:?}",
            self.config.update_interval(),
            self.config.retry_delay()
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let wait = match self.updater.update_all_reminder_statuses(&cancel).await {
                Ok(report) => {
                    if report.updated > 0 || report.skipped > 0 {
                        info!(
                            "提醒状态更新完成: 检查 {} 条, 更新 {} 条, 跳过 {} 条",
                            report.examined, report.updated, report.skipped
                        );
                    }
                    self.config.update_interval()
                }
                Err(FleetError::Cancelled) => break,
                Err(e) => {
                    if e.is_retryable() {
                        warn!("提醒状态更新失败, {:?} 后重试: {}", self.config.retry_delay(), e);
                    } else {
                        error!("提醒状态更新失败, {:?} 后重试: {}", self.config.retry_delay(), e);
                    }
                    self.config.retry_delay()
                }
            };

            if !Self::sleep_or_cancel(wait, &mut cancel).await {
                break;
            }
        }

        info!("提醒状态更新触发器已停止");
    }

    /// 返回 false 表示等待期间收到了取消信号
    async fn sleep_or_cancel(wait: Duration, cancel: &mut CancellationSignal) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = cancel.cancelled() => false,
        }
    }
}
