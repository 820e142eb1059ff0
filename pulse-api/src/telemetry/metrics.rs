//! Prometheus Metrics Definitions
//!
//! Defines all PULSE metrics with their labels. Exposed on `/metrics` for
//! Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Downstream call latency buckets (seconds)
const DOWNSTREAM_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<PulseMetrics>> = Lazy::new(PulseMetrics::new);

/// Container for all PULSE metrics.
#[derive(Clone)]
pub struct PulseMetrics {
    /// Inbound HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// Inbound HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Downstream call attempts - labels: service, operation, outcome
    pub downstream_calls_total: CounterVec,

    /// Downstream call attempt duration - labels: service, operation
    pub downstream_call_duration_seconds: HistogramVec,

    /// Retries issued by the resilience wrapper - labels: service, operation
    pub downstream_retries_total: CounterVec,

    /// Cache lookups - labels: resource, result (hit/miss/joined)
    pub cache_lookups_total: CounterVec,

    /// Composed sections - labels: section, status (fulfilled/degraded)
    pub dashboard_sections_total: CounterVec,
}

impl PulseMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "pulse_http_requests_total",
                "Total number of inbound HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "pulse_http_request_duration_seconds",
                "Inbound HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            downstream_calls_total: register_counter_vec!(
                "pulse_downstream_calls_total",
                "Total number of downstream call attempts",
                &["service", "operation", "outcome"]
            )
            .map_err(|e| registration_error("downstream_calls_total", e))?,

            downstream_call_duration_seconds: register_histogram_vec!(
                "pulse_downstream_call_duration_seconds",
                "Downstream call attempt duration in seconds",
                &["service", "operation"],
                DOWNSTREAM_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("downstream_call_duration_seconds", e))?,

            downstream_retries_total: register_counter_vec!(
                "pulse_downstream_retries_total",
                "Total number of downstream retries",
                &["service", "operation"]
            )
            .map_err(|e| registration_error("downstream_retries_total", e))?,

            cache_lookups_total: register_counter_vec!(
                "pulse_cache_lookups_total",
                "Total number of response cache lookups",
                &["resource", "result"]
            )
            .map_err(|e| registration_error("cache_lookups_total", e))?,

            dashboard_sections_total: register_counter_vec!(
                "pulse_dashboard_sections_total",
                "Total number of composed dashboard sections",
                &["section", "status"]
            )
            .map_err(|e| registration_error("dashboard_sections_total", e))?,
        })
    }

    /// Record an inbound HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record one downstream call attempt.
    pub fn record_downstream_call(
        &self,
        service: &str,
        operation: &str,
        outcome: &str,
        duration_secs: f64,
    ) {
        self.downstream_calls_total
            .with_label_values(&[service, operation, outcome])
            .inc();
        self.downstream_call_duration_seconds
            .with_label_values(&[service, operation])
            .observe(duration_secs);
    }

    pub fn record_retry(&self, service: &str, operation: &str) {
        self.downstream_retries_total
            .with_label_values(&[service, operation])
            .inc();
    }

    pub fn record_cache_lookup(&self, resource: &str, result: &str) {
        self.cache_lookups_total
            .with_label_values(&[resource, result])
            .inc();
    }

    pub fn record_section(&self, section: &str, status: &str) {
        self.dashboard_sections_total
            .with_label_values(&[section, status])
            .inc();
    }
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Run `f` against the global metrics, if they registered.
pub fn with_metrics(f: impl FnOnce(&PulseMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.downstream_calls_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_downstream_call() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        let counter = metrics
            .downstream_calls_total
            .with_label_values(&["mood", "metrics_test", "timed_out"]);
        let before = counter.get();

        metrics.record_downstream_call("mood", "metrics_test", "timed_out", 0.25);
        metrics.record_retry("mood", "metrics_test");

        assert!((counter.get() - before - 1.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_record_cache_and_sections() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_cache_lookup("tasks", "hit");
        metrics.record_cache_lookup("tasks", "joined");
        metrics.record_section("moods", "degraded");
        metrics.record_http_request("GET", "/api/v1/dashboard", 200, 0.015);
        Ok(())
    }
}
