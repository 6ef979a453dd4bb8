//! Metrics for the vector-set gateway
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Gateway metrics helper
#[derive(Clone)]
pub struct GatewayMetrics {
    /// Gateway name for labeling
    gateway: String,
}

impl GatewayMetrics {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
        }
    }

    /// Record an operation that returned a result
    pub fn command_succeeded(&self, operation: &'static str, duration: Duration) {
        counter!(
            "vset_gateway_commands_total",
            "gateway" => self.gateway.clone(),
            "operation" => operation,
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "vset_gateway_command_duration_seconds",
            "gateway" => self.gateway.clone(),
            "operation" => operation
        )
        .record(duration.as_secs_f64());
    }

    /// Record an operation that returned an error
    pub fn command_failed(&self, operation: &'static str, category: &'static str) {
        counter!(
            "vset_gateway_commands_total",
            "gateway" => self.gateway.clone(),
            "operation" => operation,
            "status" => "failed",
            "category" => category
        )
        .increment(1);
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Record a malformed reply item that was dropped instead of failing the call
pub fn lenient_skip(reply: &'static str) {
    counter!("vset_gateway_lenient_skips_total", "reply" => reply).increment(1);
}

/// Update the pooled connection gauge
pub fn pool_connections(count: usize) {
    gauge!("vset_gateway_pool_connections").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = GatewayMetrics::new("browser");
        assert_eq!(metrics.gateway, "browser");
        assert_eq!(GatewayMetrics::default().gateway, "default");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = GatewayMetrics::default();
        metrics.command_succeeded("card", Duration::from_millis(3));
        metrics.command_failed("card", "connection");
        lenient_skip("sim");
        pool_connections(2);
    }
}
