use async_trait::async_trait;
use chrono::Utc;
use fleet_core::{FleetError, FleetResult};
use fleet_domain::{
    entities::{ReminderStatus, ServiceReminder},
    repositories::ServiceReminderRepository,
    value_objects::DuePoint,
};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};

const REMINDER_COLUMNS: &str = "id, vehicle_id, service_schedule_id, work_order_id, \
     anchor_date, anchor_mileage, due_date, due_mileage, current_mileage, mileage_variance, \
     days_until_due, status, completed_at, completion_mileage, created_at, updated_at";

const OPEN_STATUSES: &str = "('UPCOMING', 'DUE_SOON', 'OVERDUE')";

pub struct SqliteServiceReminderRepository {
    pool: SqlitePool,
}

impl SqliteServiceReminderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_reminder(row: &sqlx::sqlite::SqliteRow) -> FleetResult<ServiceReminder> {
        Ok(ServiceReminder {
            id: row.try_get("id")?,
            vehicle_id: row.try_get("vehicle_id")?,
            service_schedule_id: row.try_get("service_schedule_id")?,
            work_order_id: row.try_get("work_order_id")?,
            anchor: DuePoint::from_columns(
                row.try_get("anchor_date")?,
                row.try_get("anchor_mileage")?,
            )?,
            due: DuePoint::from_columns(row.try_get("due_date")?, row.try_get("due_mileage")?)?,
            current_mileage: row.try_get("current_mileage")?,
            mileage_variance: row.try_get("mileage_variance")?,
            days_until_due: row.try_get("days_until_due")?,
            status: row.try_get("status")?,
            completed_at: row.try_get("completed_at")?,
            completion_mileage: row.try_get("completion_mileage")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn insert_reminder(
        conn: &mut SqliteConnection,
        reminder: &ServiceReminder,
    ) -> FleetResult<ServiceReminder> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO service_reminders (vehicle_id, service_schedule_id, work_order_id,
                anchor_date, anchor_mileage, due_date, due_mileage, current_mileage, mileage_variance,
                days_until_due, status, completed_at, completion_mileage, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {REMINDER_COLUMNS}
            "#
        ))
        .bind(reminder.vehicle_id)
        .bind(reminder.service_schedule_id)
        .bind(reminder.work_order_id)
        .bind(reminder.anchor.as_date())
        .bind(reminder.anchor.as_mileage())
        .bind(reminder.due.as_date())
        .bind(reminder.due.as_mileage())
        .bind(reminder.current_mileage)
        .bind(reminder.mileage_variance)
        .bind(reminder.days_until_due)
        .bind(reminder.status)
        .bind(reminder.completed_at)
        .bind(reminder.completion_mileage)
        .bind(reminder.created_at)
        .bind(reminder.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Create, "保养提醒", e))?;

        Self::row_to_reminder(&row)
    }

    async fn fetch_open(&self, vehicle_id: Option<i64>) -> FleetResult<Vec<ServiceReminder>> {
        let rows = match vehicle_id {
            Some(vehicle_id) => sqlx::query(&format!(
                "SELECT {REMINDER_COLUMNS} FROM service_reminders
                 WHERE status IN {OPEN_STATUSES} AND vehicle_id = $1 ORDER BY id"
            ))
            .bind(vehicle_id)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(&format!(
                "SELECT {REMINDER_COLUMNS} FROM service_reminders
                 WHERE status IN {OPEN_STATUSES} ORDER BY id"
            ))
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Query, "未完成提醒", e))?;

        rows.iter().map(Self::row_to_reminder).collect()
    }

    /// 条件更新未命中时重新读取状态：已进入终态或不存在
    async fn closed_reminder_error(
        conn: &mut SqliteConnection,
        reminder_id: i64,
        action: &str,
    ) -> FleetResult<FleetError> {
        let status: Option<ReminderStatus> =
            sqlx::query_scalar("SELECT status FROM service_reminders WHERE id = $1")
                .bind(reminder_id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    RepositoryErrorHelpers::database_error(RepositoryOperation::Query, "保养提醒", e)
                })?;

        Ok(match status {
            Some(status) => FleetError::invalid_transition(reminder_id, status, action),
            None => FleetError::ReminderNotFound { id: reminder_id },
        })
    }
}

#[async_trait]
impl ServiceReminderRepository for SqliteServiceReminderRepository {
    #[instrument(skip(self, reminder), fields(
        vehicle_id = %reminder.vehicle_id,
        schedule_id = %reminder.service_schedule_id,
        status = %reminder.status,
    ))]
    async fn create(&self, reminder: &ServiceReminder) -> FleetResult<ServiceReminder> {
        let mut conn = self.pool.acquire().await?;
        let created = Self::insert_reminder(&mut *conn, reminder).await?;

        RepositoryErrorHelpers::log_operation_success(
            RepositoryOperation::Create,
            &created.entity_description(),
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> FleetResult<Option<ServiceReminder>> {
        let row = sqlx::query(&format!(
            "SELECT {REMINDER_COLUMNS} FROM service_reminders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(FleetError::Database)?;

        row.as_ref().map(Self::row_to_reminder).transpose()
    }

    async fn get_open_reminders(&self) -> FleetResult<Vec<ServiceReminder>> {
        self.fetch_open(None).await
    }

    async fn get_open_by_vehicle(&self, vehicle_id: i64) -> FleetResult<Vec<ServiceReminder>> {
        self.fetch_open(Some(vehicle_id)).await
    }

    #[instrument(skip(self))]
    async fn link_work_order(
        &self,
        reminder_id: i64,
        work_order_id: i64,
    ) -> FleetResult<ServiceReminder> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE service_reminders
            SET work_order_id = $2, updated_at = $3
            WHERE id = $1 AND status IN {OPEN_STATUSES}
            RETURNING {REMINDER_COLUMNS}
            "#
        ))
        .bind(reminder_id)
        .bind(work_order_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Update, "保养提醒", e))?;

        match row {
            Some(row) => {
                RepositoryErrorHelpers::log_operation_success(RepositoryOperation::Update, "保养提醒");
                Self::row_to_reminder(&row)
            }
            None => {
                let mut conn = self.pool.acquire().await?;
                Err(Self::closed_reminder_error(&mut *conn, reminder_id, "link work order").await?)
            }
        }
    }

    #[instrument(skip(self))]
    async fn cancel(&self, reminder_id: i64) -> FleetResult<ServiceReminder> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE service_reminders
            SET status = $2, updated_at = $3
            WHERE id = $1 AND status IN {OPEN_STATUSES}
            RETURNING {REMINDER_COLUMNS}
            "#
        ))
        .bind(reminder_id)
        .bind(ReminderStatus::Cancelled)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Update, "保养提醒", e))?;

        match row {
            Some(row) => {
                RepositoryErrorHelpers::log_operation_success(RepositoryOperation::Update, "保养提醒");
                Self::row_to_reminder(&row)
            }
            None => {
                let mut conn = self.pool.acquire().await?;
                Err(Self::closed_reminder_error(&mut *conn, reminder_id, "cancel").await?)
            }
        }
    }

    #[instrument(skip(self, reminders), fields(count = reminders.len()))]
    async fn save_reminder_updates(&self, reminders: &[ServiceReminder]) -> FleetResult<Vec<i64>> {
        if reminders.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut written = Vec::with_capacity(reminders.len());

        for reminder in reminders {
            let result = sqlx::query(&format!(
                r#"
                UPDATE service_reminders
                SET status = $2, due_date = $3, due_mileage = $4, current_mileage = $5,
                    mileage_variance = $6, days_until_due = $7, updated_at = $8
                WHERE id = $1 AND status IN {OPEN_STATUSES}
                "#
            ))
            .bind(reminder.id)
            .bind(reminder.status)
            .bind(reminder.due.as_date())
            .bind(reminder.due.as_mileage())
            .bind(reminder.current_mileage)
            .bind(reminder.mileage_variance)
            .bind(reminder.days_until_due)
            .bind(reminder.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                RepositoryErrorHelpers::database_error(RepositoryOperation::BatchUpdate, "保养提醒", e)
            })?;

            if result.rows_affected() == 0 {
                debug!("提醒 {} 已进入终态或已删除，跳过写入", reminder.id);
            } else {
                written.push(reminder.id);
            }
        }

        tx.commit().await.map_err(|e| {
            RepositoryErrorHelpers::database_error(RepositoryOperation::BatchUpdate, "保养提醒", e)
        })?;

        debug!("批量保存提醒完成: 提交 {} 条, 写入 {} 条", reminders.len(), written.len());
        Ok(written)
    }

    #[instrument(skip(self, completed, next), fields(reminder_id = %completed.id))]
    async fn complete_and_schedule_next(
        &self,
        completed: &ServiceReminder,
        next: Option<&ServiceReminder>,
    ) -> FleetResult<Option<ServiceReminder>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&format!(
            r#"
            UPDATE service_reminders
            SET status = $2, work_order_id = $3, completed_at = $4, completion_mileage = $5,
                updated_at = $6
            WHERE id = $1 AND status IN {OPEN_STATUSES}
            "#
        ))
        .bind(completed.id)
        .bind(ReminderStatus::Completed)
        .bind(completed.work_order_id)
        .bind(completed.completed_at)
        .bind(completed.completion_mileage)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(RepositoryOperation::Update, "保养提醒", e))?;

        if result.rows_affected() == 0 {
            return Err(Self::closed_reminder_error(&mut *tx, completed.id, "complete").await?);
        }

        let created = match next {
            Some(next) => Some(Self::insert_reminder(&mut *tx, next).await?),
            None => None,
        };

        tx.commit().await?;

        debug!(
            "提醒 {} 已完成, 下一周期提醒: {:?}",
            completed.id,
            created.as_ref().map(|r| r.id)
        );
        Ok(created)
    }
}
