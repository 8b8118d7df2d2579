//! Prometheus metrics exposition
//!
//! - `auth_redirects_total` (counter): label `provider`
//! - `auth_signins_total` (counter): label `provider`
//! - `auth_failures_total` (counter): labels `provider`, `error_type`
//! - `auth_callback_duration_seconds` (histogram): label `provider`

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const CALLBACK_DURATION: &str = "auth_callback_duration_seconds";

/// Callback latency includes two provider round trips, each bounded by the
/// configured timeout.
const CALLBACK_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> anyhow::Result<PrometheusBuilder> {
    Ok(PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(CALLBACK_DURATION.to_string()), CALLBACK_BUCKETS)?)
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(builder()?.install_recorder()?)
}

pub fn record_redirect(provider: &str) {
    metrics::counter!("auth_redirects_total", "provider" => provider.to_string()).increment(1);
}

/// Record a completed sign-in and how long the callback took.
pub fn record_signin(provider: &str, duration_secs: f64) {
    metrics::counter!("auth_signins_total", "provider" => provider.to_string()).increment(1);
    metrics::histogram!(CALLBACK_DURATION, "provider" => provider.to_string())
        .record(duration_secs);
}

/// Record a failed callback or redirect with its classification label.
pub fn record_failure(provider: &str, error_type: &str) {
    metrics::counter!(
        "auth_failures_total",
        "provider" => provider.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// In-process counters surfaced by `/health`.
#[derive(Clone)]
pub struct ServiceMetrics {
    pub signins_total: Arc<AtomicU64>,
    pub failures_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            signins_total: Arc::new(AtomicU64::new(0)),
            failures_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}
