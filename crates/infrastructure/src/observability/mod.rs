//! Observability module
//!
//! Metrics collection and structured log events for the reminder engine.

pub mod metrics_collector;
pub mod structured_logger;

pub use metrics_collector::{init_metrics, MetricsCollector};
pub use structured_logger::StructuredLogger;
