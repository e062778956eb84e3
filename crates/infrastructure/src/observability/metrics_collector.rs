//! Metrics for the reminder status updater
//!
//! Metrics are recorded through the `metrics` facade. Nothing is exported unless
//! a recorder is installed, see [`init_metrics`].

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Metrics collector for status update passes
#[derive(Clone)]
pub struct MetricsCollector {
    passes_total: Counter,
    pass_failures_total: Counter,
    pass_duration: Histogram,
    reminders_examined_total: Counter,
    reminders_updated_total: Counter,
    reminders_skipped_total: Counter,
    open_reminders: Gauge,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            passes_total: counter!("fleet_reminder_status_passes_total"),
            pass_failures_total: counter!("fleet_reminder_status_pass_failures_total"),
            pass_duration: histogram!("fleet_reminder_status_pass_duration_seconds"),
            reminders_examined_total: counter!("fleet_reminders_examined_total"),
            reminders_updated_total: counter!("fleet_reminders_updated_total"),
            reminders_skipped_total: counter!("fleet_reminders_skipped_total"),
            open_reminders: gauge!("fleet_open_reminders"),
        }
    }

    /// Record a committed pass
    pub fn record_pass(&self, examined: usize, updated: usize, skipped: usize, duration_seconds: f64) {
        self.passes_total.increment(1);
        self.pass_duration.record(duration_seconds);
        self.reminders_examined_total.increment(examined as u64);
        self.reminders_updated_total.increment(updated as u64);
        self.reminders_skipped_total.increment(skipped as u64);
        self.open_reminders.set(examined as f64);
    }

    /// Record a pass that did not commit
    pub fn record_pass_failure(&self, duration_seconds: f64) {
        self.pass_failures_total.increment(1);
        self.pass_duration.record(duration_seconds);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("无效的指标监听地址: {bind_address}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("安装Prometheus指标导出器失败")?;

    info!("Prometheus指标导出器已启动: {}", addr);
    Ok(())
}
