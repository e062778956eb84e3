use fleet_core::FleetResult;
use sqlx::SqlitePool;
use tracing::info;

const SCHEMA: &[(&str, &str)] = &[
    (
        "车辆表",
        r#"
        CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            vin TEXT NOT NULL UNIQUE,
            license_plate TEXT,
            current_mileage REAL NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "保养方案表",
        r#"
        CREATE TABLE IF NOT EXISTS service_programs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "保养任务表",
        r#"
        CREATE TABLE IF NOT EXISTS service_tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            estimated_labour_hours REAL NOT NULL DEFAULT 0,
            estimated_cost REAL NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    ),
    (
        "保养计划表",
        r#"
        CREATE TABLE IF NOT EXISTS service_schedules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_program_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            schedule_type TEXT NOT NULL CHECK (schedule_type IN ('TIME', 'MILEAGE')),
            time_interval_value INTEGER,
            time_interval_unit TEXT,
            time_buffer_value INTEGER,
            time_buffer_unit TEXT,
            first_service_date DATETIME,
            mileage_interval REAL,
            mileage_buffer REAL,
            first_service_mileage REAL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (service_program_id) REFERENCES service_programs (id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "保养计划任务关联表",
        r#"
        CREATE TABLE IF NOT EXISTS service_schedule_tasks (
            service_schedule_id INTEGER NOT NULL,
            service_task_id INTEGER NOT NULL,
            PRIMARY KEY (service_schedule_id, service_task_id),
            FOREIGN KEY (service_schedule_id) REFERENCES service_schedules (id) ON DELETE CASCADE,
            FOREIGN KEY (service_task_id) REFERENCES service_tasks (id) ON DELETE CASCADE
        )
        "#,
    ),
    (
        "车辆保养方案关联表",
        r#"
        CREATE TABLE IF NOT EXISTS vehicle_service_programs (
            vehicle_id INTEGER NOT NULL,
            service_program_id INTEGER NOT NULL,
            enrolled_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (vehicle_id, service_program_id),
            FOREIGN KEY (vehicle_id) REFERENCES vehicles (id) ON DELETE CASCADE,
            FOREIGN KEY (service_program_id) REFERENCES service_programs (id) ON DELETE CASCADE
        )
        "#,
    ),
    // 提醒不对车辆和计划加外键：引用失效的提醒由状态更新批次跳过并记录
    (
        "保养提醒表",
        r#"
        CREATE TABLE IF NOT EXISTS service_reminders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vehicle_id INTEGER NOT NULL,
            service_schedule_id INTEGER NOT NULL,
            work_order_id INTEGER,
            anchor_date DATETIME,
            anchor_mileage REAL,
            due_date DATETIME,
            due_mileage REAL,
            current_mileage REAL NOT NULL DEFAULT 0,
            mileage_variance REAL,
            days_until_due INTEGER,
            status TEXT NOT NULL,
            completed_at DATETIME,
            completion_mileage REAL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ),
    (
        "提醒状态索引",
        "CREATE INDEX IF NOT EXISTS idx_service_reminders_status ON service_reminders(status)",
    ),
    (
        "提醒车辆索引",
        "CREATE INDEX IF NOT EXISTS idx_service_reminders_vehicle_id ON service_reminders(vehicle_id)",
    ),
    (
        "计划方案索引",
        "CREATE INDEX IF NOT EXISTS idx_service_schedules_program_id ON service_schedules(service_program_id)",
    ),
];

/// 创建所有表和索引，可重复执行
pub async fn run_migrations(pool: &SqlitePool) -> FleetResult<()> {
    info!("运行SQLite数据库迁移");

    for (name, statement) in SCHEMA {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            fleet_core::FleetError::DatabaseOperation(format!("创建{name}失败: {e}"))
        })?;
    }

    info!("数据库迁移完成");
    Ok(())
}
