//! Test helper utilities and common testing patterns

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use fleet_core::{DatabaseConfig, FleetResult};
use fleet_infrastructure::DatabaseManager;
use tokio::time::sleep;

/// Midnight UTC on the given day
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid calendar date in test")
}

/// Fresh, migrated in-memory SQLite database
pub async fn in_memory_database() -> FleetResult<DatabaseManager> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    DatabaseManager::new(&config).await
}

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }

        false
    }
}
