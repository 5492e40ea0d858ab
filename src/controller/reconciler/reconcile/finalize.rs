//! # Reconciliation Finalization
//!
//! Persists status, updates metrics, and determines the next action.

use crate::controller::reconciler::status::{clear_manual_trigger_annotation, write_status};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{PagesProject, PagesProjectStatus};
use crate::observability;
use kube_runtime::controller::Action;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Finalize reconciliation: write status, record metrics and schedule the next pass
#[allow(clippy::too_many_arguments)]
pub async fn finalize_reconciliation(
    ctx: &Reconciler,
    project: &PagesProject,
    status: &PagesProjectStatus,
    start: Instant,
    is_manual_trigger: bool,
    managed_deployments: usize,
    requeue_after: Duration,
    requeue_reason: &str,
) -> Result<Action, ReconcilerError> {
    let name = project.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = project.metadata.namespace.as_deref().unwrap_or("default");
    let attempts = ctx.config.conflict_retry_attempts;

    match write_status(ctx.store.as_ref(), namespace, name, status, attempts).await {
        Ok(true) => debug!("Updated status for {}/{}", namespace, name),
        Ok(false) => {}
        Err(e) => {
            error!("Failed to update status for {}/{}: {}", namespace, name, e);
            let err = ReconcilerError::from(e);
            observability::metrics::increment_reconciliation_errors(err.kind());
            return Err(err);
        }
    }

    // Clear manual trigger annotation if present (pagesctl reconcile)
    if is_manual_trigger {
        if let Err(e) =
            clear_manual_trigger_annotation(ctx.store.as_ref(), namespace, name, attempts).await
        {
            warn!("Failed to clear manual trigger annotation: {}", e);
        } else {
            debug!("Cleared manual trigger annotation after reconciliation");
        }
    }

    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    observability::metrics::set_managed_deployments(
        namespace,
        name,
        i64::try_from(managed_deployments).unwrap_or(i64::MAX),
    );
    observability::metrics::increment_requeues(requeue_reason);

    // The status write succeeded, so the error policy starts over next time
    ctx.reset_backoff(&format!("{namespace}/{name}"));

    info!(
        "Reconciliation complete for {}/{} ({} deployment(s), duration: {:.2}s, next in {}s)",
        namespace,
        name,
        managed_deployments,
        start.elapsed().as_secs_f64(),
        requeue_after.as_secs()
    );

    Ok(Action::requeue(requeue_after))
}
