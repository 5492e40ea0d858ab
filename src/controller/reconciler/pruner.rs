//! # Pruner
//!
//! Retention-limit garbage collection of a project's deployments.
//!
//! Production deployments are never deleted. The sort puts them first, and
//! each candidate is re-read right before deletion and skipped if it has
//! become production since the listing. Failures do not stop the remaining
//! deletions.

use crate::controller::reconciler::context::PassContext;
use crate::controller::reconciler::release_index::{by_created_desc, ReleaseIndex};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::PagesDeployment;
use crate::events::EventReason;
use crate::observability::metrics;
use kube::Resource;
use tracing::{debug, info, warn};

/// Deployments that fall beyond the retention limit
///
/// Ranked production first, then newest first; everything past `limit` is a
/// candidate unless it is production.
#[must_use]
pub fn select_prune_candidates(
    deployments: &[PagesDeployment],
    limit: usize,
) -> Vec<&PagesDeployment> {
    if deployments.len() <= limit {
        return Vec::new();
    }
    let mut ranked: Vec<&PagesDeployment> = deployments.iter().collect();
    ranked.sort_by(|a, b| {
        b.is_production()
            .cmp(&a.is_production())
            .then_with(|| by_created_desc(a, b))
    });
    ranked
        .into_iter()
        .skip(limit)
        .filter(|d| !d.is_production())
        .collect()
}

/// What a pruning pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: Vec<String>,
    /// Candidates skipped because they turned out to be production or were already gone
    pub skipped: Vec<String>,
    pub failures: Vec<String>,
}

impl PruneReport {
    /// Collected failures as a single error, if any
    #[must_use]
    pub fn into_error(self) -> Option<ReconcilerError> {
        (!self.failures.is_empty()).then_some(ReconcilerError::PartialFailure(self.failures))
    }
}

/// Delete deployments beyond `spec.revisionHistoryLimit`
pub async fn prune(ctx: &PassContext<'_>, index: &ReleaseIndex) -> PruneReport {
    let limit = ctx.project.revision_history_limit();
    let mut report = PruneReport::default();
    let candidates = select_prune_candidates(index.deployments(), limit);
    if candidates.is_empty() {
        return report;
    }
    debug!(
        "Pruning {} deployment(s) of {} beyond limit {}",
        candidates.len(),
        ctx.identity.key(),
        limit
    );

    for candidate in candidates {
        let name = candidate.metadata.name.clone().unwrap_or_default();

        match ctx.store.get_deployment(ctx.namespace(), &name).await {
            Ok(fresh) if fresh.is_production() => {
                warn!("Deployment {} became production, not pruning it", name);
                report.skipped.push(name);
                continue;
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                report.skipped.push(name);
                continue;
            }
            Err(e) => {
                warn!("Failed to re-read deployment {} before pruning: {}", name, e);
                report.failures.push(format!("prune {name}: {e}"));
                continue;
            }
        }

        match ctx.store.delete_deployment(ctx.namespace(), &name).await {
            Ok(()) => {
                info!(
                    "Pruned deployment {} (version {})",
                    name,
                    candidate.version_name().unwrap_or("unknown")
                );
                metrics::increment_deployments_pruned();
                ctx.event_for(
                    &candidate.object_ref(&()),
                    EventReason::Pruned,
                    format!("Pruned beyond revisionHistoryLimit {limit}"),
                )
                .await;
                report.deleted.push(name);
            }
            Err(e) if e.is_not_found() => report.skipped.push(name),
            Err(e) => {
                warn!("Failed to prune deployment {}: {}", name, e);
                metrics::increment_prune_failures();
                ctx.project_event(
                    EventReason::PruneFailed,
                    format!("Failed to prune deployment {name}: {e}"),
                )
                .await;
                report.failures.push(format!("prune {name}: {e}"));
            }
        }
    }
    report
}
