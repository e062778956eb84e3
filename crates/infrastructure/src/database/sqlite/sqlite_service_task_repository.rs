use async_trait::async_trait;
use fleet_core::{FleetError, FleetResult};
use fleet_domain::{
    entities::{ServiceTask, ServiceTaskCategory},
    repositories::ServiceTaskRepository,
};
use sqlx::{Row, SqlitePool};

use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};

pub struct SqliteServiceTaskRepository {
    pool: SqlitePool,
}

impl SqliteServiceTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> FleetResult<ServiceTask> {
        let category: String = row.try_get("category")?;
        Ok(ServiceTask {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            category: category.parse::<ServiceTaskCategory>()?,
            estimated_labour_hours: row.try_get("estimated_labour_hours")?,
            estimated_cost: row.try_get("estimated_cost")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

#[async_trait]
impl ServiceTaskRepository for SqliteServiceTaskRepository {
    async fn create(&self, task: &ServiceTask) -> FleetResult<ServiceTask> {
        let row = sqlx::query(
            r#"
            INSERT INTO service_tasks (name, category, estimated_labour_hours, estimated_cost, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, category, estimated_labour_hours, estimated_cost, is_active
            "#,
        )
        .bind(&task.name)
        .bind(task.category.as_str())
        .bind(task.estimated_labour_hours)
        .bind(task.estimated_cost)
        .bind(task.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Create, "保养任务", e))?;

        Self::row_to_task(&row)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceTask>> {
        let row = sqlx::query(
            "SELECT id, name, category, estimated_labour_hours, estimated_cost, is_active
             FROM service_tasks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(FleetError::Database)?;

        row.as_ref().map(Self::row_to_task).transpose()
    }
}
