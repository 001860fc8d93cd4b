//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Domain counters (allocations, routing lookups, notification
//! deliveries) are incremented by the handlers. Pool and ledger gauges are
//! refreshed on each `/metrics` scrape; see the handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Domain counters (push model, from handlers) --
    allocations_total: IntCounterVec,
    routing_lookups_total: IntCounterVec,
    notifications_total: IntCounterVec,

    // -- Domain gauges (pull model, updated on /metrics scrape) --
    proxy_numbers_total: Gauge,
    transactions_total: Gauge,
    requesters_total: Gauge,
    providers_total: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

fn counter(name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help), labels).expect("metric can be created")
}

fn gauge(name: &str, help: &str) -> Gauge {
    Gauge::new(name, help).expect("metric can be created")
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = counter(
            "mask_http_requests_total",
            "Total HTTP requests",
            &["method", "path", "status"],
        );
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "mask_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");
        let http_errors_total = counter(
            "mask_http_errors_total",
            "Total HTTP errors (4xx and 5xx)",
            &["method", "path", "status"],
        );

        let allocations_total = counter(
            "mask_allocations_total",
            "Proxy number allocations by outcome",
            &["outcome"],
        );
        let routing_lookups_total = counter(
            "mask_routing_lookups_total",
            "Inbound routing lookups by channel and outcome",
            &["channel", "outcome"],
        );
        let notifications_total = counter(
            "mask_notifications_total",
            "Outbound notification deliveries by outcome",
            &["outcome"],
        );

        let proxy_numbers_total = gauge("mask_proxy_numbers_total", "Proxy numbers in the pool");
        let transactions_total = gauge("mask_transactions_total", "Transactions in the ledger");
        let requesters_total = gauge("mask_requesters_total", "Registered requesters");
        let providers_total = gauge("mask_providers_total", "Registered providers");

        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(http_requests_total.clone()),
            Box::new(http_request_duration_seconds.clone()),
            Box::new(http_errors_total.clone()),
            Box::new(allocations_total.clone()),
            Box::new(routing_lookups_total.clone()),
            Box::new(notifications_total.clone()),
            Box::new(proxy_numbers_total.clone()),
            Box::new(transactions_total.clone()),
            Box::new(requesters_total.clone()),
            Box::new(providers_total.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .expect("metric can be registered");
        }

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                allocations_total,
                routing_lookups_total,
                notifications_total,
                proxy_numbers_total,
                transactions_total,
                requesters_total,
                providers_total,
            }),
        }
    }

    /// Total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    /// Count an allocation attempt. `outcome` is `allocated` or an
    /// `AllocationError::kind` label.
    pub fn record_allocation(&self, outcome: &str) {
        self.inner
            .allocations_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count a routing lookup for `channel` (`message` or `voice`).
    pub fn record_routing(&self, channel: &str, outcome: &str) {
        self.inner
            .routing_lookups_total
            .with_label_values(&[channel, outcome])
            .inc();
    }

    /// Count a notification delivery attempt.
    pub fn record_notification(&self, delivered: bool) {
        let outcome = if delivered { "delivered" } else { "failed" };
        self.inner
            .notifications_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn allocations(&self, outcome: &str) -> u64 {
        self.inner
            .allocations_total
            .with_label_values(&[outcome])
            .get()
    }

    pub fn routing_lookups(&self, channel: &str, outcome: &str) -> u64 {
        self.inner
            .routing_lookups_total
            .with_label_values(&[channel, outcome])
            .get()
    }

    // -- Domain gauge accessors (used by the /metrics handler) --

    pub fn proxy_numbers_total(&self) -> &Gauge {
        &self.inner.proxy_numbers_total
    }

    pub fn transactions_total(&self) -> &Gauge {
        &self.inner.transactions_total
    }

    pub fn requesters_total(&self) -> &Gauge {
        &self.inner.requesters_total
    }

    pub fn providers_total(&self) -> &Gauge {
        &self.inner.providers_total
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn sum_counter(vec: &IntCounterVec) -> u64 {
    vec.collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Replace UUID segments with `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.len() == 36
                && segment.chars().enumerate().all(|(i, c)| {
                    if i == 8 || i == 13 || i == 18 || i == 23 {
                        c == '-'
                    } else {
                        c.is_ascii_hexdigit()
                    }
                })
            {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        m.record_request(&method, &path, response.status().as_u16(), duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
    }

    #[test]
    fn errors_count_only_4xx_and_5xx() {
        let m = ApiMetrics::new();
        m.record_request("POST", "/webhook", 200, 0.01);
        m.record_request("POST", "/v1/transactions", 409, 0.02);
        m.record_request("GET", "/v1/admin/overview", 503, 0.5);
        assert_eq!(m.requests(), 3);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn domain_counters_are_labelled() {
        let m = ApiMetrics::new();
        m.record_allocation("allocated");
        m.record_allocation("no_capacity");
        m.record_allocation("allocated");
        m.record_routing("voice", "unmatched");
        assert_eq!(m.allocations("allocated"), 2);
        assert_eq!(m.allocations("no_capacity"), 1);
        assert_eq!(m.routing_lookups("voice", "unmatched"), 1);
        assert_eq!(m.routing_lookups("message", "unmatched"), 0);
    }

    #[test]
    fn encoded_output_names_domain_metrics() {
        let m = ApiMetrics::new();
        m.record_notification(false);
        m.proxy_numbers_total().set(4.0);
        let text = m.gather_and_encode().unwrap();
        assert!(text.contains("mask_notifications_total{outcome=\"failed\"} 1"));
        assert!(text.contains("mask_proxy_numbers_total 4"));
    }

    #[test]
    fn uuid_segments_are_normalized() {
        assert_eq!(
            normalize_path("/v1/transactions/550e8400-e29b-41d4-a716-446655440000"),
            "/v1/transactions/{id}"
        );
        assert_eq!(normalize_path("/webhook-voice"), "/webhook-voice");
    }
}
