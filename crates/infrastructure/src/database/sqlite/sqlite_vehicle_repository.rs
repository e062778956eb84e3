use async_trait::async_trait;
use chrono::Utc;
use fleet_core::{FleetError, FleetResult};
use fleet_domain::{entities::Vehicle, repositories::VehicleRepository};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};

const VEHICLE_COLUMNS: &str =
    "id, name, vin, license_plate, current_mileage, is_active, created_at, updated_at";

pub struct SqliteVehicleRepository {
    pool: SqlitePool,
}

impl SqliteVehicleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_vehicle(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Vehicle> {
        Ok(Vehicle {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            vin: row.try_get("vin")?,
            license_plate: row.try_get("license_plate")?,
            current_mileage: row.try_get("current_mileage")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl VehicleRepository for SqliteVehicleRepository {
    #[instrument(skip(self, vehicle), fields(vin = %vehicle.vin))]
    async fn create(&self, vehicle: &Vehicle) -> FleetResult<Vehicle> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO vehicles (name, vin, license_plate, current_mileage, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {VEHICLE_COLUMNS}
            "#
        ))
        .bind(&vehicle.name)
        .bind(&vehicle.vin)
        .bind(&vehicle.license_plate)
        .bind(vehicle.current_mileage)
        .bind(vehicle.is_active)
        .bind(vehicle.created_at)
        .bind(vehicle.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Create, "车辆", e))?;

        let created = Self::row_to_vehicle(&row)?;
        RepositoryErrorHelpers::log_operation_success(
            RepositoryOperation::Create,
            &created.entity_description(),
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<Vehicle>> {
        let row = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(FleetError::Database)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_vehicle(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_current_mileage(&self, vehicle_id: i64) -> FleetResult<f64> {
        let mileage: Option<f64> =
            sqlx::query_scalar("SELECT current_mileage FROM vehicles WHERE id = $1")
                .bind(vehicle_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(FleetError::Database)?;

        mileage.ok_or(FleetError::VehicleNotFound { id: vehicle_id })
    }

    async fn update_mileage(&self, vehicle_id: i64, mileage: f64) -> FleetResult<()> {
        if !mileage.is_finite() || mileage < 0.0 {
            return Err(FleetError::invalid_argument(format!(
                "里程读数无效: {mileage}"
            )));
        }

        let result =
            sqlx::query("UPDATE vehicles SET current_mileage = $2, updated_at = $3 WHERE id = $1")
                .bind(vehicle_id)
                .bind(mileage)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    RepositoryErrorHelpers::database_error(RepositoryOperation::Update, "车辆里程", e)
                })?;

        if result.rows_affected() == 0 {
            return Err(FleetError::VehicleNotFound { id: vehicle_id });
        }

        debug!("更新车辆里程成功: ID {}, 里程 {}", vehicle_id, mileage);
        Ok(())
    }
}
