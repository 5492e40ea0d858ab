//! Pruning, promotion exclusivity, suspend, cleanup and store failure handling

mod common;

use common::{owned_deployment, versions, Harness, NAMESPACE, PROJECT};
use kube_runtime::controller::Action;
use pages_release_controller::constants::{ANNOTATION_MANUAL_RECONCILE, PROJECT_FINALIZER};
use pages_release_controller::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn latest_preview(limit: u32) -> PagesProjectSpec {
    PagesProjectSpec {
        revision_history_limit: Some(limit),
        version_management: VersionManagement::LatestPreview(LatestPreviewPolicy::default()),
        ..Default::default()
    }
}

fn seed(h: &Harness, version: &str, environment: Environment, created_on: &str) {
    h.store.insert_deployment(owned_deployment(
        version,
        environment,
        created_on,
        DeploymentState::Succeeded,
    ));
}

fn remaining_versions(h: &Harness) -> Vec<String> {
    let mut versions: Vec<String> = h
        .deployments()
        .iter()
        .filter_map(|d| d.version_name().map(str::to_string))
        .collect();
    versions.sort();
    versions
}

fn has_finalizer(project: &PagesProject) -> bool {
    project
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|f| f == PROJECT_FINALIZER))
}

// Pruning

#[tokio::test]
async fn test_prune_deletes_oldest_beyond_limit() {
    let h = Harness::with_project(latest_preview(2));
    seed(&h, "v1", Environment::Preview, "2024-01-01T00:00:00Z");
    seed(&h, "v2", Environment::Preview, "2024-02-01T00:00:00Z");
    seed(&h, "v3", Environment::Preview, "2024-03-01T00:00:00Z");

    h.pass().await.expect("pass");

    assert_eq!(remaining_versions(&h), vec!["v2", "v3"]);
    let pruned = h.events.with_reason(EventReason::Pruned);
    assert_eq!(pruned.len(), 1);
    assert_eq!(pruned[0].name, "docs-v1-seeded");
    assert_eq!(h.status().await.managed_deployments, 2);
}

#[tokio::test]
async fn test_prune_never_deletes_production() {
    let h = Harness::with_project(latest_preview(1));
    seed(&h, "v1", Environment::Production, "2024-01-01T00:00:00Z");
    seed(&h, "v2", Environment::Preview, "2024-02-01T00:00:00Z");
    seed(&h, "v3", Environment::Preview, "2024-03-01T00:00:00Z");

    h.pass().await.expect("pass");

    assert_eq!(remaining_versions(&h), vec!["v1"]);
    let status = h.status().await;
    assert_eq!(
        status.current_production.map(|p| p.version).as_deref(),
        Some("v1")
    );
}

#[tokio::test]
async fn test_prune_failure_does_not_stop_other_deletions() {
    let h = Harness::with_project(latest_preview(1));
    seed(&h, "v1", Environment::Preview, "2024-01-01T00:00:00Z");
    seed(&h, "v2", Environment::Preview, "2024-02-01T00:00:00Z");
    seed(&h, "v3", Environment::Preview, "2024-03-01T00:00:00Z");
    h.store.fail_deletes_for("docs-v1-seeded");

    h.pass().await.expect("pruning failures are not fatal");

    assert_eq!(remaining_versions(&h), vec!["v1", "v3"]);
    assert_eq!(h.events.with_reason(EventReason::PruneFailed).len(), 1);
    assert_eq!(h.events.with_reason(EventReason::Pruned).len(), 1);
}

#[tokio::test]
async fn test_within_limit_nothing_is_pruned() {
    let h = Harness::with_project(latest_preview(5));
    seed(&h, "v1", Environment::Preview, "2024-01-01T00:00:00Z");
    seed(&h, "v2", Environment::Preview, "2024-02-01T00:00:00Z");

    h.pass().await.expect("pass");

    assert_eq!(h.store.mutation_counts().deletes, 0);
    assert_eq!(remaining_versions(&h), vec!["v1", "v2"]);
}

// Promotion

#[tokio::test]
async fn test_promotion_repairs_double_production() {
    let h = Harness::with_project(PagesProjectSpec {
        version_management: VersionManagement::AutoPromote(AutoPromotePolicy::default()),
        ..Default::default()
    });
    seed(&h, "v1", Environment::Production, "2024-01-01T00:00:00Z");
    seed(&h, "v2", Environment::Production, "2024-02-01T00:00:00Z");

    h.pass().await.expect("pass");

    assert_eq!(h.production_versions(), vec!["v2"]);
    assert!(h.events.with_reason(EventReason::AutoPromoted).is_empty());
    assert_eq!(h.events.with_reason(EventReason::ProductionDemoted).len(), 1);
}

#[tokio::test]
async fn test_repeated_promotion_is_a_no_op() {
    let h = Harness::with_project(PagesProjectSpec {
        version_management: VersionManagement::AutoPromote(AutoPromotePolicy::default()),
        ..Default::default()
    });
    seed(&h, "v1", Environment::Preview, "2024-01-01T00:00:00Z");
    h.pass().await.expect("pass");
    assert_eq!(h.production_versions(), vec!["v1"]);
    h.events.clear();

    let before = h.store.mutation_counts();
    h.pass().await.expect("pass");
    h.pass().await.expect("pass");

    assert_eq!(
        h.store.mutation_counts().deployment_writes(),
        before.deployment_writes()
    );
    assert!(h.events.events().is_empty());
    let history = h.status().await.validation_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, ValidationOutcome::Passed);
}

#[tokio::test]
async fn test_recorded_production_id_skips_promotion() {
    let h = Harness::with_project(PagesProjectSpec {
        version_management: VersionManagement::AutoPromote(AutoPromotePolicy::default()),
        ..Default::default()
    });
    seed(&h, "v1", Environment::Preview, "2024-01-01T00:00:00Z");

    // Backend already serves id-v1 as production; only the declared environment lags
    let mut project = h.project().await;
    project.status = Some(PagesProjectStatus {
        current_production: Some(ProductionInfo {
            version: "v1".to_string(),
            deployment_name: "docs-v1-seeded".to_string(),
            deployment_id: Some("id-v1".to_string()),
            url: None,
            finished_on: None,
        }),
        ..Default::default()
    });
    h.store
        .replace_project_status(&project)
        .await
        .expect("status write");

    h.pass().await.expect("pass");

    assert!(h.production_versions().is_empty());
    assert!(h.events.with_reason(EventReason::AutoPromoted).is_empty());
}

// Suspend and manual triggers

#[tokio::test]
async fn test_suspended_project_is_left_alone() {
    let h = Harness::with_project(PagesProjectSpec {
        versions: versions(&["v1"]),
        suspend: true,
        ..Default::default()
    });

    let action = h.pass().await.expect("pass");

    assert_eq!(action, Action::await_change());
    assert!(h.deployments().is_empty());
    let project = h.project().await;
    assert!(has_finalizer(&project));
    let status = project.status.expect("status");
    assert_eq!(status.phase.as_deref(), Some("Suspended"));
    assert_eq!(common::ready_reason(&status).as_deref(), Some("Suspended"));

    h.edit_spec(|spec| spec.suspend = false).await;
    h.pass().await.expect("pass");

    assert_eq!(h.deployments().len(), 1);
    assert_eq!(h.status().await.phase.as_deref(), Some("Ready"));
}

#[tokio::test]
async fn test_suspend_keeps_reported_release_set() {
    let h = Harness::with_project(PagesProjectSpec {
        versions: versions(&["v1", "v2"]),
        ..Default::default()
    });
    h.pass().await.expect("pass");

    h.edit_spec(|spec| {
        spec.suspend = true;
        spec.versions.truncate(1);
    })
    .await;
    h.pass().await.expect("pass");

    let status = h.status().await;
    assert_eq!(status.phase.as_deref(), Some("Suspended"));
    assert_eq!(status.managed_deployments, 2);
    assert_eq!(status.managed_versions.len(), 2);
}

#[tokio::test]
async fn test_manual_trigger_annotation_is_cleared() {
    let h = Harness::new();
    let mut project = common::project(PagesProjectSpec {
        versions: versions(&["v1"]),
        ..Default::default()
    });
    project.metadata.annotations = Some(BTreeMap::from([(
        ANNOTATION_MANUAL_RECONCILE.to_string(),
        "2024-05-01T10:00:00Z".to_string(),
    )]));
    h.store.insert_project(project);

    let stored = h.project().await;
    reconcile(
        Arc::new(stored),
        Arc::clone(&h.reconciler),
        TriggerSource::ManualCli,
    )
    .await
    .expect("pass");

    let annotations = h.project().await.metadata.annotations.unwrap_or_default();
    assert!(!annotations.contains_key(ANNOTATION_MANUAL_RECONCILE));
}

// Store failures

#[tokio::test]
async fn test_conflicts_are_retried() {
    let h = Harness::with_project(PagesProjectSpec {
        versions: versions(&["v1"]),
        ..Default::default()
    });
    h.store.inject_conflicts(2);

    h.pass().await.expect("conflicts within the retry budget are absorbed");

    assert!(has_finalizer(&h.project().await));
    assert_eq!(h.deployments().len(), 1);
}

#[tokio::test]
async fn test_persistent_conflict_is_returned() {
    let h = Harness::with_project(PagesProjectSpec {
        versions: versions(&["v1"]),
        ..Default::default()
    });
    h.store.inject_conflicts(100);

    let err = h.pass().await.expect_err("retry budget exhausted");

    assert!(matches!(err, ReconcilerError::Conflict(_)), "{err}");
    assert!(h.deployments().is_empty());
}

#[tokio::test]
async fn test_backend_unavailable_is_returned_and_recovers() {
    let h = Harness::with_project(PagesProjectSpec {
        versions: versions(&["v1"]),
        ..Default::default()
    });
    let project = h.project().await;
    h.store.set_unavailable(Some("apiserver unreachable"));

    let err = reconcile(
        Arc::new(project),
        Arc::clone(&h.reconciler),
        TriggerSource::WatchEvent,
    )
    .await
    .expect_err("store is down");

    assert!(matches!(err, ReconcilerError::BackendUnavailable(_)), "{err}");
    assert_eq!(err.requeue_after(), Duration::from_secs(30));

    h.store.set_unavailable(None);
    h.pass().await.expect("pass");
    assert_eq!(h.deployments().len(), 1);
}

// Deletion

#[tokio::test]
async fn test_cleanup_deletes_owned_deployments_and_releases_finalizer() {
    let h = Harness::with_project(PagesProjectSpec {
        versions: versions(&["v1", "v2"]),
        ..Default::default()
    });
    h.pass().await.expect("pass");
    let mut foreign = owned_deployment(
        "v1",
        Environment::Preview,
        "2024-01-01T00:00:00Z",
        DeploymentState::Succeeded,
    );
    foreign.metadata.name = Some("blog-v1-seeded".to_string());
    foreign.metadata.labels = None;
    foreign.spec.project_ref = ProjectRef {
        name: Some("blog".to_string()),
        external_name: Some("blog".to_string()),
    };
    if let Some(status) = foreign.status.as_mut() {
        status.project_name = None;
    }
    h.store.insert_deployment(foreign);

    let project = h.project().await;
    let action = cleanup_project(&h.reconciler, &project)
        .await
        .expect("cleanup");

    assert_eq!(action, Action::await_change());
    let remaining: Vec<_> = h
        .deployments()
        .into_iter()
        .filter_map(|d| d.metadata.name)
        .collect();
    assert_eq!(remaining, vec!["blog-v1-seeded"]);
    assert!(!has_finalizer(&h.project().await));
}

#[tokio::test]
async fn test_cleanup_failure_still_releases_finalizer() {
    let h = Harness::with_project(PagesProjectSpec {
        versions: versions(&["v1"]),
        ..Default::default()
    });
    h.pass().await.expect("pass");
    let name = h.deployment_for("v1").metadata.name.expect("name");
    h.store.fail_deletes_for(&name);

    let project = h.project().await;
    cleanup_project(&h.reconciler, &project)
        .await
        .expect("cleanup failures are reported, not returned");

    assert_eq!(h.deployments().len(), 1);
    assert_eq!(h.events.with_reason(EventReason::CleanupFailed).len(), 1);
    assert!(!has_finalizer(&h.project().await));
}

#[tokio::test]
async fn test_cleanup_without_finalizer_does_nothing() {
    let h = Harness::with_project(PagesProjectSpec::default());
    seed(&h, "v1", Environment::Preview, "2024-01-01T00:00:00Z");

    let project = h.project().await;
    cleanup_project(&h.reconciler, &project)
        .await
        .expect("cleanup");

    assert_eq!(h.deployments().len(), 1);
    assert_eq!(h.store.mutation_counts().deletes, 0);
    assert!(h
        .store
        .get_project(NAMESPACE, PROJECT)
        .await
        .is_ok());
}
