use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Months, TimeDelta, Utc};
use fleet_core::{FleetError, FleetResult};
use serde::{Deserialize, Serialize};

/// 时间间隔单位
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    #[serde(rename = "HOURS")]
    Hours,
    #[serde(rename = "DAYS")]
    Days,
    #[serde(rename = "WEEKS")]
    Weeks,
    #[serde(rename = "MONTHS")]
    Months,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Hours => "HOURS",
            TimeUnit::Days => "DAYS",
            TimeUnit::Weeks => "WEEKS",
            TimeUnit::Months => "MONTHS",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOURS" => Ok(TimeUnit::Hours),
            "DAYS" => Ok(TimeUnit::Days),
            "WEEKS" => Ok(TimeUnit::Weeks),
            "MONTHS" => Ok(TimeUnit::Months),
            _ => Err(FleetError::Serialization(format!("不支持的时间单位: {s}"))),
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for TimeUnit {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TimeUnit {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(s.parse::<TimeUnit>()?)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TimeUnit {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 带单位的正整数时间间隔，构造后不可变
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "RawTimeInterval", into = "RawTimeInterval")]
pub struct TimeInterval {
    value: u32,
    unit: TimeUnit,
}

#[derive(Serialize, Deserialize)]
struct RawTimeInterval {
    value: i64,
    unit: TimeUnit,
}

impl TryFrom<RawTimeInterval> for TimeInterval {
    type Error = FleetError;

    fn try_from(raw: RawTimeInterval) -> Result<Self, Self::Error> {
        TimeInterval::new(raw.value, raw.unit)
    }
}

impl From<TimeInterval> for RawTimeInterval {
    fn from(interval: TimeInterval) -> Self {
        RawTimeInterval {
            value: interval.value as i64,
            unit: interval.unit,
        }
    }
}

impl TimeInterval {
    pub fn new(value: i64, unit: TimeUnit) -> FleetResult<Self> {
        if value <= 0 {
            return Err(FleetError::invalid_argument(format!(
                "时间间隔必须大于0: {value} {unit}"
            )));
        }
        let value = u32::try_from(value).map_err(|_| {
            FleetError::invalid_argument(format!("时间间隔超出范围: {value} {unit}"))
        })?;

        Ok(Self { value, unit })
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// 将基准时间向后推移该间隔；超出可表示范围时取最大时间
    pub fn add_to(&self, base: DateTime<Utc>) -> DateTime<Utc> {
        let value = i64::from(self.value);
        let shifted = match self.unit {
            TimeUnit::Hours => TimeDelta::try_hours(value).and_then(|d| base.checked_add_signed(d)),
            TimeUnit::Days => TimeDelta::try_days(value).and_then(|d| base.checked_add_signed(d)),
            TimeUnit::Weeks => {
                TimeDelta::try_weeks(value).and_then(|d| base.checked_add_signed(d))
            }
            TimeUnit::Months => base.checked_add_months(Months::new(self.value)),
        };
        shifted.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// 将基准时间向前回退该间隔；超出可表示范围时取最小时间
    pub fn subtract_from(&self, base: DateTime<Utc>) -> DateTime<Utc> {
        let value = i64::from(self.value);
        let shifted = match self.unit {
            TimeUnit::Hours => TimeDelta::try_hours(value).and_then(|d| base.checked_sub_signed(d)),
            TimeUnit::Days => TimeDelta::try_days(value).and_then(|d| base.checked_sub_signed(d)),
            TimeUnit::Weeks => {
                TimeDelta::try_weeks(value).and_then(|d| base.checked_sub_signed(d))
            }
            TimeUnit::Months => base.checked_sub_months(Months::new(self.value)),
        };
        shifted.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// 保养计划类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScheduleType {
    #[serde(rename = "TIME")]
    Time,
    #[serde(rename = "MILEAGE")]
    Mileage,
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Time => "TIME",
            ScheduleType::Mileage => "MILEAGE",
        }
    }
}

impl FromStr for ScheduleType {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TIME" => Ok(ScheduleType::Time),
            "MILEAGE" => Ok(ScheduleType::Mileage),
            _ => Err(FleetError::Serialization(format!("不支持的保养计划类型: {s}"))),
        }
    }
}

/// 到期点：时间计划为日期，里程计划为里程数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DuePoint {
    Date(DateTime<Utc>),
    Mileage(f64),
}

impl DuePoint {
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            DuePoint::Date(date) => Some(*date),
            DuePoint::Mileage(_) => None,
        }
    }

    pub fn as_mileage(&self) -> Option<f64> {
        match self {
            DuePoint::Date(_) => None,
            DuePoint::Mileage(mileage) => Some(*mileage),
        }
    }

    /// 从数据库中两个可空列还原，必须恰好有一个非空
    pub fn from_columns(date: Option<DateTime<Utc>>, mileage: Option<f64>) -> FleetResult<Self> {
        match (date, mileage) {
            (Some(date), None) => Ok(DuePoint::Date(date)),
            (None, Some(mileage)) => Ok(DuePoint::Mileage(mileage)),
            (date, mileage) => Err(FleetError::Serialization(format!(
                "到期点必须恰好包含日期或里程之一: date={date:?}, mileage={mileage:?}"
            ))),
        }
    }
}

impl fmt::Display for DuePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuePoint::Date(date) => write!(f, "{}", date.format("%Y-%m-%d %H:%M:%S UTC")),
            DuePoint::Mileage(mileage) => write!(f, "{mileage} km"),
        }
    }
}

/// 一个保养周期的到期窗口
///
/// `due_soon_from` 是"即将到期"的起点，永远不晚于 `due`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DueWindow {
    Date {
        due: DateTime<Utc>,
        due_soon_from: DateTime<Utc>,
    },
    Mileage {
        due: f64,
        due_soon_from: f64,
    },
}

impl DueWindow {
    pub fn due_point(&self) -> DuePoint {
        match self {
            DueWindow::Date { due, .. } => DuePoint::Date(*due),
            DueWindow::Mileage { due, .. } => DuePoint::Mileage(*due),
        }
    }
}

/// 保养计划规则：按时间或按里程，二者只能取其一
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "schedule_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleRule {
    Time {
        interval: TimeInterval,
        buffer: Option<TimeInterval>,
        first_service_date: DateTime<Utc>,
    },
    Mileage {
        interval: f64,
        buffer: Option<f64>,
        first_service_mileage: f64,
    },
}

impl ScheduleRule {
    pub fn time(
        interval: TimeInterval,
        buffer: Option<TimeInterval>,
        first_service_date: DateTime<Utc>,
    ) -> Self {
        ScheduleRule::Time {
            interval,
            buffer,
            first_service_date,
        }
    }

    pub fn mileage(
        interval: f64,
        buffer: Option<f64>,
        first_service_mileage: f64,
    ) -> FleetResult<Self> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(FleetError::invalid_argument(format!(
                "里程间隔必须大于0: {interval}"
            )));
        }
        if let Some(buffer) = buffer {
            if !buffer.is_finite() || buffer < 0.0 {
                return Err(FleetError::invalid_argument(format!(
                    "里程缓冲不能为负数: {buffer}"
                )));
            }
        }
        if !first_service_mileage.is_finite() || first_service_mileage < 0.0 {
            return Err(FleetError::invalid_argument(format!(
                "首次保养里程不能为负数: {first_service_mileage}"
            )));
        }

        Ok(ScheduleRule::Mileage {
            interval,
            buffer,
            first_service_mileage,
        })
    }

    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            ScheduleRule::Time { .. } => ScheduleType::Time,
            ScheduleRule::Mileage { .. } => ScheduleType::Mileage,
        }
    }

    /// 第一个周期的基准点
    pub fn first_anchor(&self) -> DuePoint {
        match self {
            ScheduleRule::Time {
                first_service_date, ..
            } => DuePoint::Date(*first_service_date),
            ScheduleRule::Mileage {
                first_service_mileage,
                ..
            } => DuePoint::Mileage(*first_service_mileage),
        }
    }

    /// 完成保养后下一周期的基准点：时间计划取完成日期，里程计划取完成里程
    pub fn completion_anchor(
        &self,
        completed_at: DateTime<Utc>,
        completion_mileage: f64,
    ) -> DuePoint {
        match self {
            ScheduleRule::Time { .. } => DuePoint::Date(completed_at),
            ScheduleRule::Mileage { .. } => DuePoint::Mileage(completion_mileage),
        }
    }

    /// 以 `anchor` 为基准计算到期窗口；基准类型与规则类型不一致时返回 None
    pub fn due_window(&self, anchor: DuePoint) -> Option<DueWindow> {
        match (self, anchor) {
            (
                ScheduleRule::Time {
                    interval, buffer, ..
                },
                DuePoint::Date(anchor),
            ) => {
                let due = interval.add_to(anchor);
                let due_soon_from = buffer
                    .map(|buffer| buffer.subtract_from(due))
                    .unwrap_or(due)
                    .min(due);
                Some(DueWindow::Date { due, due_soon_from })
            }
            (
                ScheduleRule::Mileage {
                    interval, buffer, ..
                },
                DuePoint::Mileage(anchor),
            ) => {
                let due = anchor + interval;
                let due_soon_from = (due - buffer.unwrap_or(0.0)).min(due);
                Some(DueWindow::Mileage { due, due_soon_from })
            }
            _ => None,
        }
    }
}
