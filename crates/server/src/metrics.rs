//! Prometheus metrics for the Folio server.
//!
//! Exposes metrics for file attachment, storage cleanup, counter bumps,
//! authentication failures and sessions.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no slugs, user ids or filenames, only aggregate counts.
//! Restrict the endpoint at the network level or disable it with
//! `server.metrics_enabled = false`.

use crate::error::AuthFailure;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use folio_core::{CounterMetric, FileKind};
use prometheus::{self, Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// File metrics
pub static FILES_ATTACHED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "folio_files_attached_total",
            "Total number of files uploaded and made public, by kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static UPLOAD_RETRIES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_upload_retries_total",
        "Total number of upload attempts after the first",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "folio_upload_failures_total",
            "Total number of uploads that exhausted their retries, by kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static STORAGE_DELETE_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "folio_storage_delete_failures_total",
            "Total number of object deletes that failed and left an orphan, by kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

// Counter protocol metrics
pub static COUNTER_BUMPS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "folio_counter_bumps_total",
            "Total counter bump requests by metric and outcome",
        ),
        &["metric", "outcome"],
    )
    .expect("metric creation failed")
});

// Auth metrics
pub static AUTH_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "folio_auth_failures_total",
            "Total rejected bearer tokens by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed")
});

// Session metrics
pub static ACTIVE_SESSIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "folio_active_sessions",
        "Current number of sessions holding a counter ledger",
    )
    .expect("metric creation failed")
});

pub static SESSIONS_EVICTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_sessions_evicted_total",
        "Total number of idle sessions evicted",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
/// This allows safe use in integration tests or when embedding multiple routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(FILES_ATTACHED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_RETRIES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(STORAGE_DELETE_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(COUNTER_BUMPS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(AUTH_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACTIVE_SESSIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SESSIONS_EVICTED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a counter bump; `credited` is false when the ledger already held the pair.
pub fn record_bump(metric: CounterMetric, credited: bool) {
    let outcome = if credited { "credited" } else { "deduplicated" };
    COUNTER_BUMPS
        .with_label_values(&[metric.as_str(), outcome])
        .inc();
}

pub fn record_auth_failure(failure: AuthFailure) {
    AUTH_FAILURES.with_label_values(&[failure.as_str()]).inc();
}

pub fn record_delete_failure(kind: FileKind) {
    STORAGE_DELETE_FAILURES
        .with_label_values(&[kind.as_str()])
        .inc();
}
