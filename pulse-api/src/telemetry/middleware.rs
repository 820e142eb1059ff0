//! Axum middleware for inbound request tracing and metrics.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::with_metrics;

/// Label for requests that matched no route, so unknown paths do not
/// explode metric cardinality.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Wraps every request in a span and records Prometheus metrics keyed by the
/// matched route template.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();
    with_metrics(|m| {
        m.record_http_request(method.as_str(), &route, status.as_u16(), duration.as_secs_f64())
    });

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}
