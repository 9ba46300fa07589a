//! Metrics collection and export for Relay.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use relay_core::CycleStats;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// Metric names.
pub mod names {
    pub const MESSAGES_PUBLISHED_TOTAL: &str = "relay_messages_published_total";
    pub const SUBSCRIPTIONS_TOTAL: &str = "relay_subscriptions_total";
    pub const DISPATCH_CYCLES_TOTAL: &str = "relay_dispatch_cycles_total";
    pub const DISPATCH_CYCLE_SECONDS: &str = "relay_dispatch_cycle_seconds";
    pub const DELIVERIES_TOTAL: &str = "relay_deliveries_total";
    pub const MESSAGES_PENDING: &str = "relay_messages_pending";
    pub const HTTP_REQUESTS_TOTAL: &str = "relay_http_requests_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::MESSAGES_PUBLISHED_TOTAL,
        "Total number of messages accepted for buffering"
    );
    metrics::describe_counter!(
        names::SUBSCRIPTIONS_TOTAL,
        "Total number of subscriptions registered"
    );
    metrics::describe_counter!(
        names::DISPATCH_CYCLES_TOTAL,
        "Total number of dispatch cycles run"
    );
    metrics::describe_histogram!(
        names::DISPATCH_CYCLE_SECONDS,
        "Dispatch cycle wall-clock duration in seconds"
    );
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Total webhook delivery attempts, labeled by outcome"
    );
    metrics::describe_gauge!(
        names::MESSAGES_PENDING,
        "Messages currently buffered across all topics"
    );
    metrics::describe_counter!(
        names::HTTP_REQUESTS_TOTAL,
        "Total HTTP API requests, labeled by path and status"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record an accepted publish.
pub fn record_publish() {
    counter!(names::MESSAGES_PUBLISHED_TOTAL).increment(1);
}

/// Record a registered subscription.
pub fn record_subscription() {
    counter!(names::SUBSCRIPTIONS_TOTAL).increment(1);
}

/// Record a completed dispatch cycle.
pub fn record_cycle(stats: &CycleStats, elapsed: Duration) {
    counter!(names::DISPATCH_CYCLES_TOTAL).increment(1);
    histogram!(names::DISPATCH_CYCLE_SECONDS).record(elapsed.as_secs_f64());
    if stats.delivered > 0 {
        counter!(names::DELIVERIES_TOTAL, "outcome" => "delivered").increment(stats.delivered as u64);
    }
    if stats.failed > 0 {
        counter!(names::DELIVERIES_TOTAL, "outcome" => "failed").increment(stats.failed as u64);
    }
}

/// Update the buffered-messages gauge.
pub fn set_messages_pending(count: usize) {
    gauge!(names::MESSAGES_PENDING).set(count as f64);
}

/// Record an HTTP API request.
pub fn record_http_request(path: &str, status: u16) {
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
