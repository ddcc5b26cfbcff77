//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `cryostat_operator_reconciliations_total` - Total number of reconciliations
//! - `cryostat_operator_reconciliation_errors_total` - Reconciliation errors by reason
//! - `cryostat_operator_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `cryostat_operator_requeues_total` - Requeues by reason
//! - `cryostat_operator_object_operations_total` - Object store calls by kind and verb
//! - `cryostat_operator_object_operation_errors_total` - Failed object store calls by kind and verb

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cryostat_operator_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cryostat_operator_reconciliation_errors_total",
            "Total number of reconciliation errors by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "cryostat_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cryostat_operator_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static OBJECT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cryostat_operator_object_operations_total",
            "Total number of object store operations by kind and verb",
        ),
        &["kind", "verb"],
    )
    .expect("Failed to create OBJECT_OPERATIONS_TOTAL metric - this should never happen")
});

static OBJECT_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cryostat_operator_object_operation_errors_total",
            "Total number of failed object store operations by kind and verb",
        ),
        &["kind", "verb"],
    )
    .expect("Failed to create OBJECT_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

/// Register every metric with the registry served on `/metrics`
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OBJECT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OBJECT_OPERATION_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_object_operation(kind: &str, verb: &str) {
    OBJECT_OPERATIONS_TOTAL.with_label_values(&[kind, verb]).inc();
}

pub fn increment_object_operation_errors(kind: &str, verb: &str) {
    OBJECT_OPERATION_ERRORS_TOTAL
        .with_label_values(&[kind, verb])
        .inc();
}
