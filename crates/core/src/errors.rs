use thiserror::Error;

/// 车队维保提醒错误类型定义
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("车辆未找到: {id}")]
    VehicleNotFound { id: i64 },

    #[error("保养计划未找到: {id}")]
    ScheduleNotFound { id: i64 },

    #[error("保养方案未找到: {id}")]
    ProgramNotFound { id: i64 },

    #[error("保养提醒未找到: {id}")]
    ReminderNotFound { id: i64 },

    #[error("提醒 {reminder_id} 的基准类型与保养计划 {schedule_id} 不一致")]
    ScheduleMismatch { reminder_id: i64, schedule_id: i64 },

    #[error("提醒 {id} 当前状态 {status} 不允许执行 {action} 操作")]
    InvalidStateTransition {
        id: i64,
        status: String,
        action: String,
    },

    #[error("操作已取消")]
    Cancelled,

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type FleetResult<T> = std::result::Result<T, FleetError>;

impl FleetError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }

    pub fn invalid_transition(id: i64, status: impl ToString, action: &str) -> Self {
        Self::InvalidStateTransition {
            id,
            status: status.to_string(),
            action: action.to_string(),
        }
    }

    /// 引用的实体已不存在（单条提醒跳过即可，不影响整批）
    pub fn is_missing_reference(&self) -> bool {
        matches!(
            self,
            FleetError::VehicleNotFound { .. }
                | FleetError::ScheduleNotFound { .. }
                | FleetError::ProgramNotFound { .. }
                | FleetError::ReminderNotFound { .. }
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FleetError::Database(_) | FleetError::DatabaseOperation(_)
        )
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        FleetError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FleetError {
    fn from(err: anyhow::Error) -> Self {
        FleetError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reference_classification() {
        assert!(FleetError::VehicleNotFound { id: 1 }.is_missing_reference());
        assert!(FleetError::ScheduleNotFound { id: 1 }.is_missing_reference());
        assert!(!FleetError::Cancelled.is_missing_reference());
        assert!(!FleetError::invalid_argument("x").is_missing_reference());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FleetError::database_error("locked").is_retryable());
        assert!(!FleetError::Cancelled.is_retryable());
        assert!(!FleetError::ReminderNotFound { id: 3 }.is_retryable());
    }

    #[test]
    fn test_transition_error_message() {
        let err = FleetError::invalid_transition(7, "CANCELLED", "complete");
        assert_eq!(
            err.to_string(),
            "提醒 7 当前状态 CANCELLED 不允许执行 complete 操作"
        );
    }
}
