//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login Metrics
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("followgate_login_attempts_total", "Completed OAuth callbacks by outcome"),
        &["provider", "outcome"]
    ).expect("metric can be created");
    pub static ref SESSIONS_ESTABLISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("followgate_sessions_established_total", "Sessions created after a passing entitlement check"),
        &["provider"]
    ).expect("metric can be created");
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "followgate_sessions_active",
        "Approximate number of live sessions"
    ).expect("metric can be created");
    pub static ref LOGOUTS_TOTAL: IntCounter = IntCounter::new(
        "followgate_logouts_total",
        "Total number of logouts"
    ).expect("metric can be created");

    // Provider Metrics
    pub static ref PROVIDER_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("followgate_provider_requests_total", "Outbound provider API calls"),
        &["provider", "call", "outcome"]
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "followgate_provider_request_duration_seconds",
            "Outbound provider API call duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["provider", "call"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("followgate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; repeated registrations are ignored.
pub fn init_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(LOGIN_ATTEMPTS_TOTAL.clone()),
        Box::new(SESSIONS_ESTABLISHED_TOTAL.clone()),
        Box::new(SESSIONS_ACTIVE.clone()),
        Box::new(LOGOUTS_TOTAL.clone()),
        Box::new(PROVIDER_REQUESTS_TOTAL.clone()),
        Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()),
        Box::new(ERRORS_TOTAL.clone()),
    ];

    for collector in collectors {
        if let Err(error) = REGISTRY.register(collector) {
            tracing::debug!(%error, "Metric already registered");
        }
    }

    tracing::info!("Metrics registry initialized");
}

/// Record one outbound provider call.
pub fn observe_provider_call(provider: &str, call: &str, outcome: &str, seconds: f64) {
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[provider, call, outcome])
        .inc();
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[provider, call])
        .observe(seconds);
}
