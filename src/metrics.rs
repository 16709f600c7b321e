//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("giftsync_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "giftsync_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Fetch Process Metrics
    pub static ref FETCH_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("giftsync_fetch_runs_total", "Total number of external fetch process runs"),
        &["script", "outcome"]
    ).expect("metric can be created");
    pub static ref FETCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "giftsync_fetch_duration_seconds",
            "External fetch process duration in seconds"
        ).buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 45.0, 60.0]),
        &["script"]
    ).expect("metric can be created");

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("giftsync_cache_hits_total", "Total number of cache hits"),
        &["backend"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("giftsync_cache_misses_total", "Total number of cache misses"),
        &["backend"]
    ).expect("metric can be created");

    // Refresh Metrics
    pub static ref REFRESHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("giftsync_background_refreshes_total", "Total number of background refreshes"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref REFRESHES_IN_FLIGHT: IntGauge = IntGauge::new(
        "giftsync_background_refreshes_in_flight",
        "Current number of background refreshes in flight"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("giftsync_errors_total", "Total number of errors returned to callers"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
            .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(FETCH_RUNS_TOTAL.clone()))
            .expect("FETCH_RUNS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(FETCH_DURATION_SECONDS.clone()))
            .expect("FETCH_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(CACHE_HITS_TOTAL.clone()))
            .expect("CACHE_HITS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(CACHE_MISSES_TOTAL.clone()))
            .expect("CACHE_MISSES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REFRESHES_TOTAL.clone()))
            .expect("REFRESHES_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REFRESHES_IN_FLIGHT.clone()))
            .expect("REFRESHES_IN_FLIGHT can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
