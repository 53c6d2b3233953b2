//! Metrics recording implementation using Prometheus.

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Trait for recording client-side metrics.
pub trait MetricsRecorder: Clone + Send + Sync + 'static {
    /// Records a finished request with its outcome ("success", "auth_failure", "error", "transport_error").
    fn record_request(&self, endpoint: &str, outcome: &str);

    /// Records the duration of a request, retries included.
    fn record_request_duration(&self, endpoint: &str, duration_secs: f64);

    /// Records a completed token refresh ("success" or "failure").
    fn record_refresh(&self, result: &str);

    /// Records a request being re-issued after an authentication failure.
    fn record_retry(&self, reason: &str);
}

/// Prometheus metrics collector.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    requests_total: CounterVec,
    request_duration_seconds: HistogramVec,

    refresh_total: CounterVec,
    retries_total: CounterVec,
}

impl Metrics {
    /// Creates a new metrics instance with its own Prometheus registry.
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let requests_total = register_counter_vec_with_registry!(
            Opts::new("client_requests_total", "Total number of API requests"),
            &["endpoint", "outcome"],
            registry.clone()
        )
        .expect("Failed to register client_requests_total");

        let request_duration_seconds = register_histogram_vec_with_registry!(
            "client_request_duration_seconds",
            "API request duration in seconds, retries included",
            &["endpoint"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            registry.clone()
        )
        .expect("Failed to register client_request_duration_seconds");

        let refresh_total = register_counter_vec_with_registry!(
            Opts::new("token_refresh_total", "Total number of token refresh calls"),
            &["result"],
            registry.clone()
        )
        .expect("Failed to register token_refresh_total");

        let retries_total = register_counter_vec_with_registry!(
            Opts::new(
                "request_retries_total",
                "Requests re-issued after an authentication failure"
            ),
            &["reason"],
            registry.clone()
        )
        .expect("Failed to register request_retries_total");

        Metrics {
            registry,
            requests_total,
            request_duration_seconds,
            refresh_total,
            retries_total,
        }
    }

    /// Renders all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Current value of `token_refresh_total{result}`.
    pub fn refresh_count(&self, result: &str) -> u64 {
        self.refresh_total.with_label_values(&[result]).get() as u64
    }

    /// Current value of `request_retries_total{reason}`.
    pub fn retry_count(&self, reason: &str) -> u64 {
        self.retries_total.with_label_values(&[reason]).get() as u64
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder for Metrics {
    fn record_request(&self, endpoint: &str, outcome: &str) {
        self.requests_total
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    fn record_request_duration(&self, endpoint: &str, duration_secs: f64) {
        self.request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    fn record_refresh(&self, result: &str) {
        self.refresh_total.with_label_values(&[result]).inc();
    }

    fn record_retry(&self, reason: &str) {
        self.retries_total.with_label_values(&[reason]).inc();
    }
}
