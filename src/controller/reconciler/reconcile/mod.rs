//! # Reconciliation Logic
//!
//! Main reconciliation pass for PagesProject resources.
//!
//! Stage order within one pass:
//! 1. deletion (finalizer cleanup) or finalizer registration
//! 2. suspend check and spec validation
//! 3. policy pass: release set, re-list, resolve, gate, promote
//! 4. re-list, prune
//! 5. re-list, status aggregation and write
//!
//! Policy failures do not abort pruning or status aggregation; they surface as
//! a `Ready=False` condition plus an event and pick the requeue delay.

mod cleanup;
mod finalize;

pub use cleanup::cleanup_project;
pub use finalize::finalize_reconciliation;

use crate::constants::PROJECT_FINALIZER;
use crate::controller::reconciler::context::PassContext;
use crate::controller::reconciler::history::ValidationHistory;
use crate::controller::reconciler::policy::{engine_for, run_policy_pass, PolicyOutcome};
use crate::controller::reconciler::pruner::prune;
use crate::controller::reconciler::release_index::ReleaseIndex;
use crate::controller::reconciler::status::{
    compute_status, is_manual_trigger, suspended_status, write_status, StatusInputs,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, TriggerSource};
use crate::controller::reconciler::validation::validate_pages_project;
use crate::crd::PagesProject;
use crate::events::EventReason;
use crate::observability;
use crate::store::add_project_finalizer;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Main reconciliation function
/// Errors returned here are handled by the controller's error policy
pub async fn reconcile(
    project: Arc<PagesProject>,
    ctx: Arc<Reconciler>,
    trigger_source: TriggerSource,
) -> Result<Action, ReconcilerError> {
    let name = project.metadata.name.as_deref().unwrap_or("unknown");
    let span = tracing::info_span!(
        "reconcile",
        resource.name = name,
        resource.namespace = project.metadata.namespace.as_deref().unwrap_or("default"),
        resource.kind = "PagesProject",
        resource.policy = project.spec.version_management.kind().as_str(),
        trigger = trigger_source.as_str()
    );
    reconcile_project(&project, &ctx, trigger_source)
        .instrument(span)
        .await
}

async fn reconcile_project(
    project: &PagesProject,
    ctx: &Reconciler,
    trigger_source: TriggerSource,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let pass = PassContext::new(
        ctx.store.as_ref(),
        ctx.events.as_ref(),
        project,
        ctx.config.conflict_retry_attempts,
    );
    let identity = pass.identity.clone();

    if project.metadata.deletion_timestamp.is_some() {
        return cleanup_project(ctx, project).await;
    }

    info!(
        "Reconciling PagesProject: {} (trigger source: {})",
        identity.key(),
        trigger_source.as_str()
    );

    add_project_finalizer(
        pass.store,
        &identity.namespace,
        &identity.name,
        PROJECT_FINALIZER,
        pass.conflict_attempts,
    )
    .await?;

    if project.spec.suspend {
        info!(
            "Reconciliation suspended for PagesProject: {} - skipping reconciliation",
            identity.key()
        );
        let status = suspended_status(project, &chrono::Utc::now().to_rfc3339());
        write_status(
            pass.store,
            &identity.namespace,
            &identity.name,
            &status,
            pass.conflict_attempts,
        )
        .await?;
        return Ok(Action::await_change());
    }

    observability::metrics::increment_reconciliations();

    let mut history = ValidationHistory::from_status(project);
    let mut outcome = PolicyOutcome::default();
    let policy_result = match validate_pages_project(project) {
        Ok(()) => {
            let engine = engine_for(project);
            run_policy_pass(&pass, engine.as_ref(), &mut history, &mut outcome).await
        }
        Err(e) => {
            error!("Validation error for {}: {}", identity.key(), e);
            Err(ReconcilerError::invalid_spec(e.to_string()))
        }
    };

    let policy_error = match policy_result {
        Ok(()) => None,
        Err(err) => {
            warn!(
                "Version reconciliation failed for {}: {}",
                identity.key(),
                err
            );
            observability::metrics::increment_reconciliation_errors(err.kind());
            pass.project_event(EventReason::VersionReconcileFailed, err.to_string())
                .await;
            Some(err)
        }
    };
    if outcome.release_set.changed() {
        debug!(
            "Release set for {} changed: created {:?}, recreated {:?}",
            identity.key(),
            outcome.release_set.created,
            outcome.release_set.recreated
        );
    }

    // Pruning runs on every pass, policy failure or not
    let index = ReleaseIndex::load(pass.store, &identity).await?;
    let report = prune(&pass, &index).await;
    let pruned_any = !report.deleted.is_empty();
    if let Some(err) = report.into_error() {
        warn!("Pruning for {} was incomplete: {}", identity.key(), err);
    }

    let index = if pruned_any {
        ReleaseIndex::load(pass.store, &identity).await?
    } else {
        index
    };

    let status = compute_status(
        project,
        &index,
        StatusInputs {
            policy: identity.policy,
            preview: outcome.preview.clone(),
            history: history.into_vec(),
            error: policy_error.as_ref(),
            now: chrono::Utc::now().to_rfc3339(),
        },
    );

    let requeue_after = match &policy_error {
        Some(err) => err.requeue_after(),
        None => outcome
            .requeue_after
            .unwrap_or_else(|| ctx.config.default_sync_interval()),
    };
    let requeue_reason = policy_error.as_ref().map_or("resync", ReconcilerError::kind);

    finalize_reconciliation(
        ctx,
        project,
        &status,
        start,
        is_manual_trigger(project),
        index.len(),
        requeue_after,
        requeue_reason,
    )
    .await
}
