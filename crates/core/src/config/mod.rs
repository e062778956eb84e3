//! 配置管理
//!
//! 加载顺序：内置默认值 → TOML配置文件 → 环境变量覆盖（前缀 `FLEET_`，层级分隔符 `__`）。
//! 例如 `FLEET_REMINDER_UPDATER__UPDATE_INTERVAL_SECONDS=120` 覆盖状态更新间隔。

pub mod models;

pub use models::*;
