//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `pages_release_reconciliations_total` - Total number of reconciliations
//! - `pages_release_reconciliation_errors_total{kind}` - Reconciliation errors by error kind
//! - `pages_release_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `pages_release_requeues_total{reason}` - Requeues by reason
//! - `pages_release_managed_deployments{namespace,project}` - Deployments owned by a project
//! - `pages_release_deployments_created_total` - Deployment objects created
//! - `pages_release_deployments_recreated_total` - Deployment objects replaced after a source change
//! - `pages_release_deployments_pruned_total` - Deployment objects garbage-collected
//! - `pages_release_prune_failures_total` - Failed prune deletions
//! - `pages_release_promotions_total{policy}` - Production promotions
//! - `pages_release_demotions_total{policy}` - Production demotions
//! - `pages_release_validation_failures_total{policy}` - Promotions blocked by a validation gate

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pages_release_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pages_release_reconciliation_errors_total",
            "Total number of reconciliation errors by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "pages_release_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pages_release_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static MANAGED_DEPLOYMENTS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "pages_release_managed_deployments",
            "Current number of deployments owned by a project",
        ),
        &["namespace", "project"],
    )
    .expect("Failed to create MANAGED_DEPLOYMENTS metric - this should never happen")
});

static DEPLOYMENTS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pages_release_deployments_created_total",
        "Total number of deployment objects created",
    )
    .expect("Failed to create DEPLOYMENTS_CREATED_TOTAL metric - this should never happen")
});

static DEPLOYMENTS_RECREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pages_release_deployments_recreated_total",
        "Total number of deployment objects replaced after a source change",
    )
    .expect("Failed to create DEPLOYMENTS_RECREATED_TOTAL metric - this should never happen")
});

static DEPLOYMENTS_PRUNED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pages_release_deployments_pruned_total",
        "Total number of deployment objects pruned beyond the revision history limit",
    )
    .expect("Failed to create DEPLOYMENTS_PRUNED_TOTAL metric - this should never happen")
});

static PRUNE_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pages_release_prune_failures_total",
        "Total number of failed prune deletions",
    )
    .expect("Failed to create PRUNE_FAILURES_TOTAL metric - this should never happen")
});

static PROMOTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pages_release_promotions_total",
            "Total number of production promotions by policy",
        ),
        &["policy"],
    )
    .expect("Failed to create PROMOTIONS_TOTAL metric - this should never happen")
});

static DEMOTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pages_release_demotions_total",
            "Total number of production demotions by policy",
        ),
        &["policy"],
    )
    .expect("Failed to create DEMOTIONS_TOTAL metric - this should never happen")
});

static VALIDATION_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pages_release_validation_failures_total",
            "Total number of promotions blocked by a validation gate",
        ),
        &["policy"],
    )
    .expect("Failed to create VALIDATION_FAILURES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MANAGED_DEPLOYMENTS.clone()))?;
    REGISTRY.register(Box::new(DEPLOYMENTS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPLOYMENTS_RECREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPLOYMENTS_PRUNED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PRUNE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROMOTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEMOTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VALIDATION_FAILURES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn set_managed_deployments(namespace: &str, project: &str, count: i64) {
    MANAGED_DEPLOYMENTS
        .with_label_values(&[namespace, project])
        .set(count);
}

/// Drop the gauge series of a deleted project
pub fn remove_managed_deployments(namespace: &str, project: &str) {
    // A missing series is not an error worth reporting
    let _ = MANAGED_DEPLOYMENTS.remove_label_values(&[namespace, project]);
}

pub fn increment_deployments_created() {
    DEPLOYMENTS_CREATED_TOTAL.inc();
}

pub fn increment_deployments_recreated() {
    DEPLOYMENTS_RECREATED_TOTAL.inc();
}

pub fn increment_deployments_pruned() {
    DEPLOYMENTS_PRUNED_TOTAL.inc();
}

pub fn increment_prune_failures() {
    PRUNE_FAILURES_TOTAL.inc();
}

pub fn increment_promotions(policy: &str) {
    PROMOTIONS_TOTAL.with_label_values(&[policy]).inc();
}

pub fn increment_demotions(policy: &str) {
    DEMOTIONS_TOTAL.with_label_values(&[policy]).inc();
}

pub fn increment_validation_failures(policy: &str) {
    VALIDATION_FAILURES_TOTAL.with_label_values(&[policy]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // Registration is process-wide; a second call from another test reports duplicates
        let _ = register_metrics();
        assert!(!REGISTRY.gather().is_empty());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        assert_eq!(RECONCILIATIONS_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_reconciliation_errors_are_labelled_by_kind() {
        let before = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["not_found"])
            .get();
        increment_reconciliation_errors("not_found");
        let after = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["not_found"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        observe_reconciliation_duration(1.5);
        // Just verify it doesn't panic
    }

    #[test]
    fn test_managed_deployments_gauge() {
        set_managed_deployments("web", "metrics-test", 3);
        assert_eq!(
            MANAGED_DEPLOYMENTS
                .with_label_values(&["web", "metrics-test"])
                .get(),
            3
        );
        set_managed_deployments("web", "metrics-test", 1);
        assert_eq!(
            MANAGED_DEPLOYMENTS
                .with_label_values(&["web", "metrics-test"])
                .get(),
            1
        );
        remove_managed_deployments("web", "metrics-test");
    }

    #[test]
    fn test_promotions_and_demotions_by_policy() {
        let promoted = PROMOTIONS_TOTAL.with_label_values(&["gitops"]).get();
        let demoted = DEMOTIONS_TOTAL.with_label_values(&["gitops"]).get();
        increment_promotions("gitops");
        increment_demotions("gitops");
        increment_demotions("gitops");
        assert_eq!(
            PROMOTIONS_TOTAL.with_label_values(&["gitops"]).get(),
            promoted + 1
        );
        assert_eq!(
            DEMOTIONS_TOTAL.with_label_values(&["gitops"]).get(),
            demoted + 2
        );
    }

    #[test]
    fn test_requeues_by_reason() {
        let before = REQUEUES_TOTAL.with_label_values(&["resync"]).get();
        increment_requeues("resync");
        assert_eq!(
            REQUEUES_TOTAL.with_label_values(&["resync"]).get(),
            before + 1
        );
    }
}
