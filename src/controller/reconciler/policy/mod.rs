//! # Policy Engines
//!
//! Each version management policy decides which versions are materialized,
//! which version is the current preview and which deployment should hold
//! production, plus the gate a candidate must pass before it is promoted.
//!
//! - `declarative`: every declared version, production from `spec.productionTarget`
//! - `gitops`: explicit preview/production names, gated by validation history
//! - `latest_preview`: newest succeeded deployment matching a selector (also AutoPromote)
//! - `external`: version names written into the spec by an outside actor
//!
//! [`run_policy_pass`] drives the selected engine through the release set,
//! the gate and the promotion protocol.

mod declarative;
mod external;
mod gitops;
mod latest_preview;

pub use declarative::DeclarativeEngine;
pub use external::ExternalEngine;
pub use gitops::GitOpsEngine;
pub use latest_preview::LatestPreviewEngine;

use crate::controller::reconciler::context::PassContext;
use crate::controller::reconciler::history::ValidationHistory;
use crate::controller::reconciler::promotion::{promote_exclusive, PromotionOutcome};
use crate::controller::reconciler::release_index::ReleaseIndex;
use crate::controller::reconciler::release_set::{reconcile_release_set, ReleaseSetOutcome};
use crate::controller::reconciler::sources::ResolvedVersion;
use crate::controller::reconciler::types::{PromotionBlocked, ReconcilerError};
use crate::crd::{
    PagesDeployment, PagesProject, PolicyKind, ValidationOutcome, VersionManagement,
};
use crate::events::EventReason;
use crate::observability::metrics;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The deployment a policy wants in production
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionPlan {
    pub version: String,
    pub deployment_name: String,
    /// Event reason published when the promotion happens
    pub reason: EventReason,
}

/// What a policy resolved for the current pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Version selected as current preview
    pub preview: Option<String>,
    /// Deployment that should hold production; `None` leaves production untouched
    pub production: Option<ProductionPlan>,
    /// Policy-specific requeue interval overriding the default resync
    pub requeue_after: Option<Duration>,
}

/// Strategy seam shared by every version management policy
pub trait PolicyEngine: Send + Sync {
    fn kind(&self) -> PolicyKind;

    /// Versions the release set must materialize
    fn desired_versions(&self, project: &PagesProject)
        -> Result<Vec<ResolvedVersion>, ReconcilerError>;

    /// Pick preview and production against the freshly listed deployments
    fn resolve(
        &self,
        project: &PagesProject,
        index: &ReleaseIndex,
    ) -> Result<Resolution, ReconcilerError>;

    /// Gate a candidate must pass before it is promoted
    fn gate(
        &self,
        _project: &PagesProject,
        _history: &ValidationHistory,
        _candidate: &PagesDeployment,
    ) -> Result<(), PromotionBlocked> {
        Ok(())
    }
}

/// Select the engine for a project's `versionManagement`
#[must_use]
pub fn engine_for(project: &PagesProject) -> Box<dyn PolicyEngine> {
    match &project.spec.version_management {
        VersionManagement::Declarative => Box::new(DeclarativeEngine),
        VersionManagement::GitOps(cfg) => Box::new(GitOpsEngine::new(cfg.clone())),
        VersionManagement::LatestPreview(cfg) => Box::new(LatestPreviewEngine::new(
            cfg.selector.clone(),
            cfg.auto_promote,
            PolicyKind::LatestPreview,
        )),
        VersionManagement::AutoPromote(cfg) => Box::new(LatestPreviewEngine::new(
            cfg.selector.clone(),
            true,
            PolicyKind::AutoPromote,
        )),
        VersionManagement::External(cfg) => Box::new(ExternalEngine::new(cfg.clone())),
    }
}

/// Look up the deployment standing for `version` and turn it into a production plan
pub(crate) fn plan_for_version(
    index: &ReleaseIndex,
    version: &str,
    reason: EventReason,
) -> Result<ProductionPlan, ReconcilerError> {
    let deployment = index.for_version(version).ok_or_else(|| {
        ReconcilerError::NotFound(format!("no deployment exists for version {version}"))
    })?;
    Ok(ProductionPlan {
        version: version.to_string(),
        deployment_name: deployment.metadata.name.clone().unwrap_or_default(),
        reason,
    })
}

/// What one policy pass did
#[derive(Debug, Clone, Default)]
pub struct PolicyOutcome {
    pub release_set: ReleaseSetOutcome,
    pub preview: Option<String>,
    pub promotion: Option<PromotionOutcome>,
    pub requeue_after: Option<Duration>,
}

/// Run the release set, gate and promotion stages for one project
///
/// Stages fill `outcome` as they complete, so a pass that fails at the gate
/// still reports the release set changes and the resolved preview. Gate
/// outcomes are recorded into `history` even when the pass fails, so the
/// caller can persist them alongside the error condition.
pub async fn run_policy_pass(
    ctx: &PassContext<'_>,
    engine: &dyn PolicyEngine,
    history: &mut ValidationHistory,
    outcome: &mut PolicyOutcome,
) -> Result<(), ReconcilerError> {
    let project = ctx.project;
    let desired = engine.desired_versions(project)?;
    debug!(
        "Policy {} wants {} version(s) materialized for {}",
        engine.kind(),
        desired.len(),
        ctx.identity.key()
    );

    outcome.release_set = reconcile_release_set(ctx, &desired).await?;

    // Re-list so resolution sees the objects created above
    let index = ReleaseIndex::load(ctx.store, &ctx.identity).await?;
    let resolution = engine.resolve(project, &index)?;
    outcome.preview.clone_from(&resolution.preview);
    outcome.requeue_after = resolution.requeue_after;

    let Some(plan) = resolution.production else {
        return Ok(());
    };
    let candidate = index.by_name(&plan.deployment_name).ok_or_else(|| {
        ReconcilerError::NotFound(format!(
            "deployment {} for version {} disappeared",
            plan.deployment_name, plan.version
        ))
    })?;

    if !candidate.is_production() {
        if let Err(blocked) = engine.gate(project, history, candidate) {
            warn!(
                "Promotion of version {} for {} blocked: {}",
                plan.version,
                ctx.identity.key(),
                blocked
            );
            metrics::increment_validation_failures(engine.kind().as_str());
            let recorded = history.record(
                &plan.version,
                candidate.external_id().unwrap_or_default(),
                engine.kind(),
                ValidationOutcome::Failed,
            );
            if recorded {
                ctx.project_event(
                    EventReason::ValidationFailed,
                    format!("Version {} not promoted: {blocked}", plan.version),
                )
                .await;
            }
            return Err(ReconcilerError::blocked(blocked));
        }
    }

    let recorded_production_id = project
        .status
        .as_ref()
        .and_then(|s| s.current_production.as_ref())
        .and_then(|p| p.deployment_id.as_deref());

    let promotion =
        promote_exclusive(ctx, &index, candidate, recorded_production_id, plan.reason).await?;
    if promotion.promoted {
        history.record(
            &plan.version,
            candidate.external_id().unwrap_or_default(),
            engine.kind(),
            ValidationOutcome::Passed,
        );
        info!(
            "Version {} is now production for {}",
            plan.version,
            ctx.identity.key()
        );
    }
    outcome.promotion = Some(promotion);
    Ok(())
}
