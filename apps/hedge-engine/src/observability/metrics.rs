//! Prometheus metrics for the hedge engine.
//!
//! Recording functions are no-ops until a recorder is installed, so the
//! backtest calls them unconditionally.
//!
//! # Example
//!
//! ```ignore
//! use hedge_engine::observability::{MetricsConfig, init_metrics};
//!
//! init_metrics(&MetricsConfig::with_addr("0.0.0.0:9090".parse()?))?;
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::ErrorKind;
use crate::execution::Fill;
use crate::hedging::HedgeDecision;
use crate::risk::RiskSnapshot;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for cycle latency (seconds).
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
            // 100us to 2s
            latency_buckets: vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0,
            ],
        }
    }
}

impl MetricsConfig {
    /// Configuration listening on `addr`.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Listen address could not be parsed.
    #[error("invalid metrics address '{0}'")]
    InvalidAddress(String),
    /// Failed to configure the exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install the exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

impl MetricsConfig {
    /// Parse `addr` as the listen address.
    pub fn parse(addr: &str) -> Result<Self, MetricsError> {
        let addr = addr
            .parse()
            .map_err(|_| MetricsError::InvalidAddress(addr.to_string()))?;
        Ok(Self::with_addr(addr))
    }
}

/// Start the Prometheus exporter serving `/metrics`.
///
/// Must be called inside a tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %config.listen_addr, "Prometheus metrics exporter started");
    Ok(())
}

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Record one hedging decision.
pub fn record_decision(decision: &HedgeDecision) {
    counter!(
        "hedge_decisions_total",
        "action" => decision.action.to_string(),
        "state" => decision.state.to_string()
    )
    .increment(1);
}

/// Record an executed fill.
pub fn record_fill(fill: &Fill) {
    counter!(
        "hedge_fills_total",
        "instrument_kind" => fill.instrument.kind().as_str(),
        "partial" => fill.is_partial().to_string()
    )
    .increment(1);
    histogram!("hedge_fill_notional").record(as_f64(fill.notional()));
    histogram!("hedge_fill_fee").record(as_f64(fill.fee));
}

/// Record a classified error.
pub fn record_error(kind: ErrorKind) {
    counter!("hedge_errors_total", "kind" => kind.as_str()).increment(1);
}

/// Publish portfolio risk gauges.
pub fn record_risk(snapshot: &RiskSnapshot) {
    gauge!("hedge_net_delta").set(as_f64(snapshot.net_delta()));
    gauge!("hedge_net_gamma").set(as_f64(snapshot.gamma()));
    gauge!("hedge_net_vega").set(as_f64(snapshot.vega()));
    gauge!("hedge_var").set(as_f64(snapshot.var().total));
    gauge!("hedge_worst_stress_pnl").set(as_f64(snapshot.worst_stress_pnl()));
}

/// Record the latency of one decision cycle.
pub fn record_cycle_latency(seconds: f64) {
    histogram!("hedge_cycle_latency_seconds").record(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let config = MetricsConfig::parse("127.0.0.1:9464").unwrap();
        assert_eq!(config.listen_addr.port(), 9464);
        assert!(matches!(
            MetricsConfig::parse("not-an-address"),
            Err(MetricsError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_error(ErrorKind::Timeout);
        record_cycle_latency(0.01);
    }
}
