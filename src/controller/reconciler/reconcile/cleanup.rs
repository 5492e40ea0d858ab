//! # Deletion Cleanup
//!
//! Runs when a PagesProject is being deleted: owned deployments are deleted
//! best-effort, then the finalizer is released. Owner references cascade
//! anything left behind, so a failed deletion never blocks the project.

use crate::constants::PROJECT_FINALIZER;
use crate::controller::reconciler::context::PassContext;
use crate::controller::reconciler::release_index::ReleaseIndex;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::PagesProject;
use crate::events::EventReason;
use crate::observability;
use crate::store::remove_project_finalizer;
use kube_runtime::controller::Action;
use tracing::{debug, info, warn};

/// Delete the project's deployments and remove the cleanup finalizer
pub async fn cleanup_project(
    ctx: &Reconciler,
    project: &PagesProject,
) -> Result<Action, ReconcilerError> {
    let pass = PassContext::new(
        ctx.store.as_ref(),
        ctx.events.as_ref(),
        project,
        ctx.config.conflict_retry_attempts,
    );
    let identity = &pass.identity;

    let has_finalizer = project
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|f| f == PROJECT_FINALIZER));
    if !has_finalizer {
        debug!("PagesProject {} has no cleanup finalizer", identity.key());
        return Ok(Action::await_change());
    }

    info!("Cleaning up deployments of deleted PagesProject {}", identity.key());

    let mut failures = Vec::new();
    match ReleaseIndex::load(pass.store, identity).await {
        Ok(index) => {
            for deployment in index.deployments() {
                let name = deployment.metadata.name.as_deref().unwrap_or_default();
                match pass.store.delete_deployment(pass.namespace(), name).await {
                    Ok(()) => debug!("Deleted deployment {}", name),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => failures.push(format!("delete {name}: {e}")),
                }
            }
        }
        Err(e) => failures.push(format!("list deployments: {e}")),
    }

    if !failures.is_empty() {
        let err = ReconcilerError::PartialFailure(failures);
        warn!(
            "Cleanup of PagesProject {} was incomplete, relying on owner references: {}",
            identity.key(),
            err
        );
        pass.project_event(EventReason::CleanupFailed, err.to_string())
            .await;
    }

    remove_project_finalizer(
        pass.store,
        &identity.namespace,
        &identity.name,
        PROJECT_FINALIZER,
        pass.conflict_attempts,
    )
    .await?;
    observability::metrics::remove_managed_deployments(&identity.namespace, &identity.name);
    info!("Released finalizer of PagesProject {}", identity.key());
    Ok(Action::await_change())
}
