//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatcher metrics (requests, latency, throttling, cache activity)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method, status, route
//! - `dispatch_request_duration_seconds` (histogram): latency by method, route
//! - `dispatch_throttled_total` (counter): rejected requests by route
//! - `dispatch_cache_events_total` (counter): hit / miss / expired / stored / evicted
//! - `dispatch_cache_urls` (gauge): distinct urls currently cached
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Route label is the registered pattern, never the raw path

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "dispatch_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!(
        "dispatch_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a request rejected by the throttle.
pub fn record_throttled(route: &str) {
    counter!("dispatch_throttled_total", "route" => route.to_string()).increment(1);
}

/// Record a cache event (`hit`, `miss`, `expired`, `stored`, `evicted`).
pub fn record_cache_event(event: &'static str) {
    counter!("dispatch_cache_events_total", "event" => event).increment(1);
}

/// Record the number of distinct urls in the cache.
pub fn record_cache_size(urls: usize) {
    gauge!("dispatch_cache_urls").set(urls as f64);
}
