use async_trait::async_trait;
use fleet_core::{FleetError, FleetResult};
use fleet_domain::{entities::ServiceProgram, repositories::ServiceProgramRepository};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};

pub struct SqliteServiceProgramRepository {
    pool: SqlitePool,
}

impl SqliteServiceProgramRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_program(row: &sqlx::sqlite::SqliteRow) -> FleetResult<ServiceProgram> {
        Ok(ServiceProgram {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ServiceProgramRepository for SqliteServiceProgramRepository {
    #[instrument(skip(self, program), fields(name = %program.name))]
    async fn create(&self, program: &ServiceProgram) -> FleetResult<ServiceProgram> {
        let row = sqlx::query(
            r#"
            INSERT INTO service_programs (name, description, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, is_active, created_at, updated_at
            "#,
        )
        .bind(&program.name)
        .bind(&program.description)
        .bind(program.is_active)
        .bind(program.created_at)
        .bind(program.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Create, "保养方案", e))?;

        Self::row_to_program(&row)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceProgram>> {
        let row = sqlx::query(
            "SELECT id, name, description, is_active, created_at, updated_at
             FROM service_programs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(FleetError::Database)?;

        row.as_ref().map(Self::row_to_program).transpose()
    }

    async fn enroll_vehicle(&self, program_id: i64, vehicle_id: i64) -> FleetResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO vehicle_service_programs (vehicle_id, service_program_id) VALUES ($1, $2)",
        )
        .bind(vehicle_id)
        .bind(program_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Create, "方案关联", e))?;

        let enrolled = result.rows_affected() > 0;
        debug!(
            "车辆 {} 加入保养方案 {}: {}",
            vehicle_id,
            program_id,
            if enrolled { "新增" } else { "已存在" }
        );
        Ok(enrolled)
    }

    async fn unenroll_vehicle(&self, program_id: i64, vehicle_id: i64) -> FleetResult<bool> {
        let result = sqlx::query(
            "DELETE FROM vehicle_service_programs WHERE vehicle_id = $1 AND service_program_id = $2",
        )
        .bind(vehicle_id)
        .bind(program_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Delete, "方案关联", e))?;

        Ok(result.rows_affected() > 0)
    }
}
