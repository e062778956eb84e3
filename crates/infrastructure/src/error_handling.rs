//! 仓储操作的错误上下文
//!
//! 数据库错误在转换为 `FleetError` 之前记录操作类型和实体描述，便于定位失败的语句。

use std::fmt;

use fleet_core::FleetError;
use sqlx::Error as SqlxError;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy)]
pub enum RepositoryOperation {
    Create,
    Update,
    Delete,
    Query,
    BatchUpdate,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "查询"),
            RepositoryOperation::BatchUpdate => write!(f, "批量更新"),
        }
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    pub fn database_error(
        operation: RepositoryOperation,
        entity: &str,
        err: SqlxError,
    ) -> FleetError {
        error!(
            operation = %operation,
            entity = entity,
            error = %err,
            "{}{}失败",
            operation,
            entity
        );
        FleetError::DatabaseOperation(format!("{operation}{entity}失败: {err}"))
    }

    pub fn log_operation_success(operation: RepositoryOperation, entity: &str) {
        debug!(operation = %operation, entity = entity, "{}{}成功", operation, entity);
    }
}
