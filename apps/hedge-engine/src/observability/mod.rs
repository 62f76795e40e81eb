//! Metrics for the hedge engine.
//!
//! Counters and gauges are recorded through the `metrics` facade and
//! exported by Prometheus when the binary installs the exporter.

mod metrics;

pub use metrics::{
    MetricsConfig, MetricsError, init_metrics, record_cycle_latency, record_decision,
    record_error, record_fill, record_risk,
};
