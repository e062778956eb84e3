pub mod app_config;
pub mod database;
pub mod observability;
pub mod reminder_updater;

pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use observability::ObservabilityConfig;
pub use reminder_updater::ReminderUpdaterConfig;
