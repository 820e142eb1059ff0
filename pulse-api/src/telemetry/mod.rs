//! PULSE Telemetry - structured logging and Prometheus metrics

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, PulseMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
