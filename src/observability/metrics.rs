//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `adhar_reconciliations_total{controller}` - total reconciliations, by controller
//! - `adhar_reconciliation_errors_total{controller}` - total reconciliation errors
//! - `adhar_reconciliation_duration_seconds{controller}` - reconcile duration histogram
//! - `adhar_git_repositories_synced_total` - GitRepository objects successfully materialised
//! - `adhar_git_operation_errors_total{operation}` - git worktree helper failures
//! - `adhar_custom_packages_synced_total` - CustomPackage objects fully converged
//! - `adhar_requeues_total{reason}` - requeues, tagged by cause

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("adhar_reconciliations_total", "Total number of reconciliations"),
        &["controller"],
    )
    .expect("metric registration arguments are static and valid")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "adhar_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["controller"],
    )
    .expect("metric registration arguments are static and valid")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "adhar_reconciliation_duration_seconds",
            "Duration of a reconcile call in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["controller"],
    )
    .expect("metric registration arguments are static and valid")
});

static GIT_REPOSITORIES_SYNCED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "adhar_git_repositories_synced_total",
        "Total number of GitRepository resources successfully materialised",
    )
    .expect("metric registration arguments are static and valid")
});

static GIT_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "adhar_git_operation_errors_total",
            "Total number of git worktree helper failures",
        ),
        &["operation"],
    )
    .expect("metric registration arguments are static and valid")
});

static CUSTOM_PACKAGES_SYNCED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "adhar_custom_packages_synced_total",
        "Total number of CustomPackage resources that reached synced=true",
    )
    .expect("metric registration arguments are static and valid")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("adhar_requeues_total", "Total number of reconcile requeues"),
        &["reason"],
    )
    .expect("metric registration arguments are static and valid")
});

/// Register every metric with the process-wide registry. Must be called once
/// during start-up before the HTTP server begins serving `/metrics`.
///
/// # Errors
///
/// Returns an error if a metric with a colliding name is already registered.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(GIT_REPOSITORIES_SYNCED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GIT_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CUSTOM_PACKAGES_SYNCED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(controller: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn increment_reconciliation_errors(controller: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn observe_reconciliation_duration(controller: &str, seconds: f64) {
    RECONCILIATION_DURATION.with_label_values(&[controller]).observe(seconds);
}

pub fn increment_git_repositories_synced() {
    GIT_REPOSITORIES_SYNCED_TOTAL.inc();
}

pub fn increment_git_operation_errors(operation: &str) {
    GIT_OPERATION_ERRORS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_custom_packages_synced() {
    CUSTOM_PACKAGES_SYNCED_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub(crate) fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}
