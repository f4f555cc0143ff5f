//! Prometheus metrics for the incident-creation workflow.
//!
//! Collectors are process-wide statics; `init_metrics` registers them with
//! `PROMETHEUS_REGISTRY` once at startup and `gather_metrics` renders the
//! text exposition format served on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Incident creation requests by outcome
    ///
    /// Labels: outcome (ok, error)
    pub static ref INCIDENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("incidents_total", "Incident creation requests by outcome")
            .namespace("incident_bridge"),
        &["outcome"]
    ).expect("Failed to create INCIDENTS_TOTAL metric");

    /// Duration of Grafana IRM create calls in seconds
    ///
    /// Labels: result (success, timeout, transport, protocol, invalid_response)
    pub static ref GATEWAY_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "gateway_request_duration_seconds",
            "Duration of Grafana IRM incident creation calls"
        )
        .namespace("incident_bridge")
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["result"]
    ).expect("Failed to create GATEWAY_REQUEST_DURATION_SECONDS metric");

    /// Audit log entries written
    pub static ref AUDIT_LOG_ENTRIES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("audit_log_entries_total", "Incident audit log entries written")
            .namespace("incident_bridge")
    ).expect("Failed to create AUDIT_LOG_ENTRIES_TOTAL metric");
}

/// Register all collectors with the global registry
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(INCIDENTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(GATEWAY_REQUEST_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(AUDIT_LOG_ENTRIES_TOTAL.clone()))?;
    Ok(())
}

/// Render all registered metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

pub fn record_outcome(outcome: &str) {
    INCIDENTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn observe_gateway_call(result: &str, seconds: f64) {
    GATEWAY_REQUEST_DURATION_SECONDS
        .with_label_values(&[result])
        .observe(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accept_labels() {
        let before = INCIDENTS_TOTAL.with_label_values(&["ok"]).get();
        record_outcome("ok");
        // Other tests record outcomes concurrently
        assert!(INCIDENTS_TOTAL.with_label_values(&["ok"]).get() >= before + 1.0);

        observe_gateway_call("timeout", 30.0);
        assert!(
            GATEWAY_REQUEST_DURATION_SECONDS
                .with_label_values(&["timeout"])
                .get_sample_count()
                >= 1
        );
    }
}
