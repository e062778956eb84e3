use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_core::{FleetError, FleetResult};
use fleet_domain::{
    entities::ServiceSchedule,
    repositories::ServiceScheduleRepository,
    value_objects::{ScheduleRule, ScheduleType, TimeInterval, TimeUnit},
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};

const SCHEDULE_COLUMNS: &str = "id, service_program_id, name, schedule_type, \
     time_interval_value, time_interval_unit, time_buffer_value, time_buffer_unit, first_service_date, \
     mileage_interval, mileage_buffer, first_service_mileage, is_active, created_at, updated_at";

/// 计划规则拆分到表中的列
#[derive(Default)]
struct RuleColumns {
    time_interval_value: Option<i64>,
    time_interval_unit: Option<TimeUnit>,
    time_buffer_value: Option<i64>,
    time_buffer_unit: Option<TimeUnit>,
    first_service_date: Option<DateTime<Utc>>,
    mileage_interval: Option<f64>,
    mileage_buffer: Option<f64>,
    first_service_mileage: Option<f64>,
}

impl From<&ScheduleRule> for RuleColumns {
    fn from(rule: &ScheduleRule) -> Self {
        match rule {
            ScheduleRule::Time {
                interval,
                buffer,
                first_service_date,
            } => RuleColumns {
                time_interval_value: Some(i64::from(interval.value())),
                time_interval_unit: Some(interval.unit()),
                time_buffer_value: buffer.map(|b| i64::from(b.value())),
                time_buffer_unit: buffer.map(|b| b.unit()),
                first_service_date: Some(*first_service_date),
                ..Default::default()
            },
            ScheduleRule::Mileage {
                interval,
                buffer,
                first_service_mileage,
            } => RuleColumns {
                mileage_interval: Some(*interval),
                mileage_buffer: *buffer,
                first_service_mileage: Some(*first_service_mileage),
                ..Default::default()
            },
        }
    }
}

impl RuleColumns {
    /// 第一个不为空的按时间字段
    fn first_time_column(&self) -> Option<&'static str> {
        [
            ("time_interval_value", self.time_interval_value.is_some()),
            ("time_interval_unit", self.time_interval_unit.is_some()),
            ("time_buffer_value", self.time_buffer_value.is_some()),
            ("time_buffer_unit", self.time_buffer_unit.is_some()),
            ("first_service_date", self.first_service_date.is_some()),
        ]
        .into_iter()
        .find_map(|(column, present)| present.then_some(column))
    }

    /// 第一个不为空的按里程字段
    fn first_mileage_column(&self) -> Option<&'static str> {
        [
            ("mileage_interval", self.mileage_interval.is_some()),
            ("mileage_buffer", self.mileage_buffer.is_some()),
            ("first_service_mileage", self.first_service_mileage.is_some()),
        ]
        .into_iter()
        .find_map(|(column, present)| present.then_some(column))
    }
}

pub struct SqliteServiceScheduleRepository {
    pool: SqlitePool,
}

impl SqliteServiceScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> FleetResult<ScheduleRule> {
        let schedule_type: String = row.try_get("schedule_type")?;
        let id: i64 = row.try_get("id")?;
        let columns = RuleColumns {
            time_interval_value: row.try_get("time_interval_value")?,
            time_interval_unit: row.try_get("time_interval_unit")?,
            time_buffer_value: row.try_get("time_buffer_value")?,
            time_buffer_unit: row.try_get("time_buffer_unit")?,
            first_service_date: row.try_get("first_service_date")?,
            mileage_interval: row.try_get("mileage_interval")?,
            mileage_buffer: row.try_get("mileage_buffer")?,
            first_service_mileage: row.try_get("first_service_mileage")?,
        };
        let corrupt =
            |detail: String| FleetError::Serialization(format!("保养计划 {id} 数据损坏: {detail}"));
        let missing = |column: &str| corrupt(format!("缺少字段 {column}"));

        match schedule_type.parse::<ScheduleType>()? {
            ScheduleType::Time => {
                if let Some(column) = columns.first_mileage_column() {
                    return Err(corrupt(format!("按时间计划不应有字段 {column}")));
                }

                let interval = TimeInterval::new(
                    columns
                        .time_interval_value
                        .ok_or_else(|| missing("time_interval_value"))?,
                    columns
                        .time_interval_unit
                        .ok_or_else(|| missing("time_interval_unit"))?,
                )?;

                let buffer = match (columns.time_buffer_value, columns.time_buffer_unit) {
                    (Some(value), Some(unit)) => Some(TimeInterval::new(value, unit)?),
                    (None, None) => None,
                    (Some(_), None) => return Err(missing("time_buffer_unit")),
                    (None, Some(_)) => return Err(missing("time_buffer_value")),
                };

                Ok(ScheduleRule::time(
                    interval,
                    buffer,
                    columns
                        .first_service_date
                        .ok_or_else(|| missing("first_service_date"))?,
                ))
            }
            ScheduleType::Mileage => {
                if let Some(column) = columns.first_time_column() {
                    return Err(corrupt(format!("按里程计划不应有字段 {column}")));
                }

                ScheduleRule::mileage(
                    columns
                        .mileage_interval
                        .ok_or_else(|| missing("mileage_interval"))?,
                    columns.mileage_buffer,
                    columns
                        .first_service_mileage
                        .ok_or_else(|| missing("first_service_mileage"))?,
                )
            }
        }
    }

    fn row_to_schedule(
        row: &sqlx::sqlite::SqliteRow,
        service_task_ids: Vec<i64>,
    ) -> FleetResult<ServiceSchedule> {
        Ok(ServiceSchedule {
            id: row.try_get("id")?,
            service_program_id: row.try_get("service_program_id")?,
            name: row.try_get("name")?,
            rule: Self::row_to_rule(row)?,
            service_task_ids,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn load_task_ids(&self, schedule_id: i64) -> FleetResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT service_task_id FROM service_schedule_tasks
             WHERE service_schedule_id = $1 ORDER BY service_task_id",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(FleetError::Database)?;
        Ok(ids)
    }

    async fn replace_task_links(
        tx: &mut Transaction<'_, Sqlite>,
        schedule_id: i64,
        task_ids: &[i64],
    ) -> FleetResult<()> {
        sqlx::query("DELETE FROM service_schedule_tasks WHERE service_schedule_id = $1")
            .bind(schedule_id)
            .execute(&mut **tx)
            .await?;

        for task_id in task_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO service_schedule_tasks (service_schedule_id, service_task_id)
                 VALUES ($1, $2)",
            )
            .bind(schedule_id)
            .bind(task_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceScheduleRepository for SqliteServiceScheduleRepository {
    #[instrument(skip(self, schedule), fields(
        program_id = %schedule.service_program_id,
        schedule_type = schedule.rule.schedule_type().as_str(),
    ))]
    async fn create(&self, schedule: &ServiceSchedule) -> FleetResult<ServiceSchedule> {
        let columns = RuleColumns::from(&schedule.rule);
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO service_schedules (service_program_id, name, schedule_type,
                time_interval_value, time_interval_unit, time_buffer_value, time_buffer_unit, first_service_date,
                mileage_interval, mileage_buffer, first_service_mileage, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {SCHEDULE_COLUMNS}
            "#
        ))
        .bind(schedule.service_program_id)
        .bind(&schedule.name)
        .bind(schedule.rule.schedule_type().as_str())
        .bind(columns.time_interval_value)
        .bind(columns.time_interval_unit)
        .bind(columns.time_buffer_value)
        .bind(columns.time_buffer_unit)
        .bind(columns.first_service_date)
        .bind(columns.mileage_interval)
        .bind(columns.mileage_buffer)
        .bind(columns.first_service_mileage)
        .bind(schedule.is_active)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Create, "保养计划", e))?;

        let id: i64 = row.try_get("id")?;
        Self::replace_task_links(&mut tx, id, &schedule.service_task_ids).await?;
        tx.commit().await?;

        let created = Self::row_to_schedule(&row, schedule.service_task_ids.clone())?;
        RepositoryErrorHelpers::log_operation_success(
            RepositoryOperation::Create,
            &created.entity_description(),
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceSchedule>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM service_schedules WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(FleetError::Database)?;

        match row {
            Some(row) => {
                let task_ids = self.load_task_ids(id).await?;
                Ok(Some(Self::row_to_schedule(&row, task_ids)?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_program(&self, program_id: i64) -> FleetResult<Vec<ServiceSchedule>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM service_schedules WHERE service_program_id = $1 ORDER BY id"
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await
        .map_err(FleetError::Database)?;

        let mut schedules = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let task_ids = self.load_task_ids(id).await?;
            schedules.push(Self::row_to_schedule(row, task_ids)?);
        }
        Ok(schedules)
    }

    async fn update(&self, schedule: &ServiceSchedule) -> FleetResult<()> {
        let columns = RuleColumns::from(&schedule.rule);
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE service_schedules
            SET name = $2, schedule_type = $3,
                time_interval_value = $4, time_interval_unit = $5, time_buffer_value = $6,
                time_buffer_unit = $7, first_service_date = $8,
                mileage_interval = $9, mileage_buffer = $10, first_service_mileage = $11,
                is_active = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(schedule.id)
        .bind(&schedule.name)
        .bind(schedule.rule.schedule_type().as_str())
        .bind(columns.time_interval_value)
        .bind(columns.time_interval_unit)
        .bind(columns.time_buffer_value)
        .bind(columns.time_buffer_unit)
        .bind(columns.first_service_date)
        .bind(columns.mileage_interval)
        .bind(columns.mileage_buffer)
        .bind(columns.first_service_mileage)
        .bind(schedule.is_active)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Update, "保养计划", e))?;

        if result.rows_affected() == 0 {
            return Err(FleetError::ScheduleNotFound { id: schedule.id });
        }

        Self::replace_task_links(&mut tx, schedule.id, &schedule.service_task_ids).await?;
        tx.commit().await?;

        debug!("更新保养计划成功: ID {}", schedule.id);
        Ok(())
    }
}
