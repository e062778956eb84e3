use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use fleet_core::{FleetError, FleetResult};
use serde::{Deserialize, Serialize};

use crate::value_objects::{DuePoint, ScheduleRule};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub name: String,
    pub vin: String,
    pub license_plate: Option<String>,
    /// 里程表读数，由车辆维护流程写入，提醒引擎只读
    pub current_mileage: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(name: String, vin: String, current_mileage: f64) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            name,
            vin,
            license_plate: None,
            current_mileage,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn entity_description(&self) -> String {
        format!("车辆 '{}' (ID: {}, VIN: {})", self.name, self.id, self.vin)
    }
}

/// 保养方案：一组可分配给车辆的保养计划
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProgram {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceProgram {
    pub fn new(name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            description,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceTaskCategory {
    #[serde(rename = "PREVENTIVE")]
    Preventive,
    #[serde(rename = "CORRECTIVE")]
    Corrective,
    #[serde(rename = "EMERGENCY")]
    Emergency,
    #[serde(rename = "INSPECTION")]
    Inspection,
    #[serde(rename = "WARRANTY")]
    Warranty,
}

impl ServiceTaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTaskCategory::Preventive => "PREVENTIVE",
            ServiceTaskCategory::Corrective => "CORRECTIVE",
            ServiceTaskCategory::Emergency => "EMERGENCY",
            ServiceTaskCategory::Inspection => "INSPECTION",
            ServiceTaskCategory::Warranty => "WARRANTY",
        }
    }
}

impl FromStr for ServiceTaskCategory {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PREVENTIVE" => Ok(ServiceTaskCategory::Preventive),
            "CORRECTIVE" => Ok(ServiceTaskCategory::Corrective),
            "EMERGENCY" => Ok(ServiceTaskCategory::Emergency),
            "INSPECTION" => Ok(ServiceTaskCategory::Inspection),
            "WARRANTY" => Ok(ServiceTaskCategory::Warranty),
            _ => Err(FleetError::Serialization(format!("无效的保养任务类别: {s}"))),
        }
    }
}

/// 保养任务，被保养计划引用而不归其所有
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTask {
    pub id: i64,
    pub name: String,
    pub category: ServiceTaskCategory,
    pub estimated_labour_hours: f64,
    pub estimated_cost: f64,
    pub is_active: bool,
}

impl ServiceTask {
    pub fn new(name: String, category: ServiceTaskCategory) -> Self {
        Self {
            id: 0,
            name,
            category,
            estimated_labour_hours: 0.0,
            estimated_cost: 0.0,
            is_active: true,
        }
    }
}

/// 保养计划，隶属于唯一的保养方案
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSchedule {
    pub id: i64,
    pub service_program_id: i64,
    pub name: String,
    pub rule: ScheduleRule,
    pub service_task_ids: Vec<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceSchedule {
    pub fn new(service_program_id: i64, name: String, rule: ScheduleRule) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            service_program_id,
            name,
            rule,
            service_task_ids: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn entity_description(&self) -> String {
        format!(
            "保养计划 '{}' (ID: {}, 类型: {})",
            self.name,
            self.id,
            self.rule.schedule_type().as_str()
        )
    }
}

/// 保养提醒状态
///
/// Upcoming → DueSoon → Overdue 由状态更新批次推进；
/// Completed 与 Cancelled 是终态，只能由外部操作进入。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReminderStatus {
    #[serde(rename = "UPCOMING")]
    Upcoming,
    #[serde(rename = "DUE_SOON")]
    DueSoon,
    #[serde(rename = "OVERDUE")]
    Overdue,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Upcoming => "UPCOMING",
            ReminderStatus::DueSoon => "DUE_SOON",
            ReminderStatus::Overdue => "OVERDUE",
            ReminderStatus::Completed => "COMPLETED",
            ReminderStatus::Cancelled => "CANCELLED",
        }
    }

    /// 展示用标签
    pub fn label(&self) -> &'static str {
        match self {
            ReminderStatus::Upcoming => "Upcoming",
            ReminderStatus::DueSoon => "Due Soon",
            ReminderStatus::Overdue => "Overdue",
            ReminderStatus::Completed => "Completed",
            ReminderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReminderStatus::Completed | ReminderStatus::Cancelled)
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderStatus {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPCOMING" => Ok(ReminderStatus::Upcoming),
            "DUE_SOON" => Ok(ReminderStatus::DueSoon),
            "OVERDUE" => Ok(ReminderStatus::Overdue),
            "COMPLETED" => Ok(ReminderStatus::Completed),
            "CANCELLED" => Ok(ReminderStatus::Cancelled),
            _ => Err(FleetError::Serialization(format!("无效的提醒状态: {s}"))),
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for ReminderStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ReminderStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(s.parse::<ReminderStatus>()?)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ReminderStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 某辆车的一条保养到期义务
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceReminder {
    pub id: i64,
    pub vehicle_id: i64,
    pub service_schedule_id: i64,
    /// 开始施工后关联的工单
    pub work_order_id: Option<i64>,
    /// 本周期的基准点：首个周期取计划的首次保养值，之后取上一周期的完成值
    pub anchor: DuePoint,
    pub due: DuePoint,
    pub current_mileage: f64,
    /// 距到期里程的差值，负数表示已超期（仅里程计划）
    pub mileage_variance: Option<f64>,
    /// 距到期日的天数，负数表示已超期（仅时间计划）
    pub days_until_due: Option<i64>,
    pub status: ReminderStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_mileage: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceReminder {
    /// 基于计划和基准点创建新的提醒；基准点类型与计划不符时返回错误
    pub fn new(
        vehicle_id: i64,
        schedule: &ServiceSchedule,
        anchor: DuePoint,
        current_mileage: f64,
    ) -> FleetResult<Self> {
        let window = schedule
            .rule
            .due_window(anchor)
            .ok_or(FleetError::ScheduleMismatch {
                reminder_id: 0,
                schedule_id: schedule.id,
            })?;
        let now = Utc::now();

        Ok(Self {
            id: 0, // 将由数据库生成
            vehicle_id,
            service_schedule_id: schedule.id,
            work_order_id: None,
            anchor,
            due: window.due_point(),
            current_mileage,
            mileage_variance: None,
            days_until_due: None,
            status: ReminderStatus::Upcoming,
            completed_at: None,
            completion_mileage: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due.as_date()
    }

    pub fn due_mileage(&self) -> Option<f64> {
        self.due.as_mileage()
    }

    pub fn link_work_order(&mut self, work_order_id: i64) -> FleetResult<()> {
        if !self.is_open() {
            return Err(FleetError::invalid_transition(
                self.id,
                self.status,
                "link_work_order",
            ));
        }
        self.work_order_id = Some(work_order_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_completed(
        &mut self,
        work_order_id: i64,
        completed_at: DateTime<Utc>,
        completion_mileage: f64,
    ) -> FleetResult<()> {
        if !self.is_open() {
            return Err(FleetError::invalid_transition(self.id, self.status, "complete"));
        }
        self.status = ReminderStatus::Completed;
        self.work_order_id = Some(work_order_id);
        self.completed_at = Some(completed_at);
        self.completion_mileage = Some(completion_mileage);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self) -> FleetResult<()> {
        if !self.is_open() {
            return Err(FleetError::invalid_transition(self.id, self.status, "cancel"));
        }
        self.status = ReminderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn entity_description(&self) -> String {
        format!(
            "保养提醒 (ID: {}, 车辆: {}, 计划: {}, 状态: {})",
            self.id, self.vehicle_id, self.service_schedule_id, self.status
        )
    }
}
