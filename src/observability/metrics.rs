//! # Metrics
//!
//! Prometheus metrics for monitoring the provider.
//!
//! ## Metrics Exposed
//!
//! - `hostinger_reconciliations_total` - Total number of reconciliation passes
//! - `hostinger_reconciliation_errors_total` - Total number of failed passes
//! - `hostinger_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `hostinger_http_requests_total` - HTTP attempts against the Hostinger API by status class
//! - `hostinger_http_retries_total` - Retried HTTP attempts
//! - `hostinger_token_refreshes_total` - OAuth access tokens fetched

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hostinger_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hostinger_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "hostinger_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "hostinger_http_requests_total",
            "Total number of HTTP attempts against the Hostinger API by status class",
        ),
        &["status_class"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric - this should never happen")
});

static HTTP_RETRIES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hostinger_http_retries_total",
        "Total number of retried HTTP attempts",
    )
    .expect("Failed to create HTTP_RETRIES_TOTAL metric - this should never happen")
});

static TOKEN_REFRESHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "hostinger_token_refreshes_total",
        "Total number of OAuth access tokens fetched",
    )
    .expect("Failed to create TOKEN_REFRESHES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HTTP_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TOKEN_REFRESHES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// Record one HTTP attempt; `status` is `None` for transport failures
pub fn record_http_request(status: Option<u16>) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[status_class(status)])
        .inc();
}

pub fn increment_http_retries() {
    HTTP_RETRIES_TOTAL.inc();
}

pub fn increment_token_refreshes() {
    TOKEN_REFRESHES_TOTAL.inc();
}

fn status_class(status: Option<u16>) -> &'static str {
    match status {
        None => "error",
        Some(100..=199) => "1xx",
        Some(200..=299) => "2xx",
        Some(300..=399) => "3xx",
        Some(400..=499) => "4xx",
        Some(500..=599) => "5xx",
        Some(_) => "other",
    }
}
