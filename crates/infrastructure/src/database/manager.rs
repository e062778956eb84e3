use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::{DatabaseConfig, FleetError, FleetResult};
use fleet_domain::repositories::{
    ServiceProgramRepository, ServiceReminderRepository, ServiceScheduleRepository,
    ServiceTaskRepository, VehicleRepository,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use super::migrations::run_migrations;
use super::sqlite::{
    SqliteServiceProgramRepository, SqliteServiceReminderRepository,
    SqliteServiceScheduleRepository, SqliteServiceTaskRepository, SqliteVehicleRepository,
};

/// 数据库连接与仓储工厂
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 创建连接池并执行迁移
    pub async fn new(config: &DatabaseConfig) -> FleetResult<Self> {
        info!("创建SQLite数据库连接池: {}", config.url);

        let connect_options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| FleetError::Configuration(format!("解析数据库URL失败: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections.min(config.max_connections))
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));

        // 内存数据库的每个连接都是独立的库，只能使用一个永不回收的连接
        if config.url.contains(":memory:") {
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(connect_options).await?;

        run_migrations(&pool).await?;

        info!("数据库连接池创建完成");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> FleetResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    pub fn vehicle_repository(&self) -> Arc<dyn VehicleRepository> {
        Arc::new(SqliteVehicleRepository::new(self.pool.clone()))
    }

    pub fn service_program_repository(&self) -> Arc<dyn ServiceProgramRepository> {
        Arc::new(SqliteServiceProgramRepository::new(self.pool.clone()))
    }

    pub fn service_task_repository(&self) -> Arc<dyn ServiceTaskRepository> {
        Arc::new(SqliteServiceTaskRepository::new(self.pool.clone()))
    }

    pub fn service_schedule_repository(&self) -> Arc<dyn ServiceScheduleRepository> {
        Arc::new(SqliteServiceScheduleRepository::new(self.pool.clone()))
    }

    pub fn service_reminder_repository(&self) -> Arc<dyn ServiceReminderRepository> {
        Arc::new(SqliteServiceReminderRepository::new(self.pool.clone()))
    }
}
