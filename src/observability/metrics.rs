//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `resource_duplicator_reconciliations_total` - Total number of reconciliations
//! - `resource_duplicator_reconcile_outcomes_total{outcome}` - Reconciliations by outcome (done, retry, fatal)
//! - `resource_duplicator_reconciliation_duration_seconds` - Duration of reconciliations
//! - `resource_duplicator_replicas_applied_total{result}` - Replica upserts by result (created, updated, unchanged)
//! - `resource_duplicator_replicas_deleted_total` - Replicas deleted (pruning and directive deletion)
//! - `resource_duplicator_requeues_total{reason}` - Requeues scheduled, by reason
//! - `resource_duplicator_namespace_events_routed_total` - Reconcile requests emitted for namespace changes

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "resource_duplicator_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILE_OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "resource_duplicator_reconcile_outcomes_total",
            "Total number of reconciliations by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create RECONCILE_OUTCOMES_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "resource_duplicator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REPLICAS_APPLIED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "resource_duplicator_replicas_applied_total",
            "Total number of replica upserts by result",
        ),
        &["result"],
    )
    .expect("Failed to create REPLICAS_APPLIED_TOTAL metric - this should never happen")
});

static REPLICAS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "resource_duplicator_replicas_deleted_total",
        "Total number of replicas deleted",
    )
    .expect("Failed to create REPLICAS_DELETED_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "resource_duplicator_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static NAMESPACE_EVENTS_ROUTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "resource_duplicator_namespace_events_routed_total",
        "Total number of reconcile requests emitted for namespace changes",
    )
    .expect("Failed to create NAMESPACE_EVENTS_ROUTED_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_OUTCOMES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REPLICAS_APPLIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REPLICAS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NAMESPACE_EVENTS_ROUTED_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconcile_outcome(outcome: &str) {
    RECONCILE_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_replicas_applied(result: &str) {
    REPLICAS_APPLIED_TOTAL.with_label_values(&[result]).inc();
}

pub fn increment_replicas_deleted() {
    REPLICAS_DELETED_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_namespace_events_routed(count: usize) {
    NAMESPACE_EVENTS_ROUTED_TOTAL.inc_by(u64::try_from(count).unwrap_or(u64::MAX));
}
