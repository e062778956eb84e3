use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 保养提醒状态更新任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderUpdaterConfig {
    pub enabled: bool,
    /// 两次成功执行之间的间隔（秒）
    pub update_interval_seconds: u64,
    /// 执行失败后的重试等待（秒）
    pub retry_delay_seconds: u64,
}

impl Default for ReminderUpdaterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_interval_seconds: 60, // 1分钟
            retry_delay_seconds: 30,
        }
    }
}

impl ReminderUpdaterConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.update_interval_seconds == 0 {
            return Err(anyhow::anyhow!("状态更新间隔必须大于0"));
        }

        if self.retry_delay_seconds == 0 {
            return Err(anyhow::anyhow!("重试等待时间必须大于0"));
        }

        Ok(())
    }
}
