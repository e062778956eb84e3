pub mod cancellation;
pub mod config;
pub mod errors;

pub use cancellation::{CancellationSignal, CancellationSource};
pub use crate::config::models::{AppConfig, DatabaseConfig, ObservabilityConfig, ReminderUpdaterConfig};
pub use errors::*;
