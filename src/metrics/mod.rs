//! Metrics collection and exposition for Prometheus.
//!
//! Counts API requests, token refreshes and retries per client instance.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
