//! Monitoring Module
//!
//! Observability for the governor:
//! - Tracing subscriber setup
//! - Decision counters

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, LogFormat, LoggingConfig};
pub use metrics::{Counter, DecisionMetrics, MetricsSnapshot};
