//! # Promotion
//!
//! The shared primitive behind every policy: promote one deployment and demote
//! every other production deployment of the project.
//!
//! Promotion flips the deployment's declared environment. The downstream
//! backend controller reacts to the flip, which works for versions that were
//! never production before.

use crate::controller::reconciler::context::PassContext;
use crate::controller::reconciler::release_index::ReleaseIndex;
use crate::controller::reconciler::types::{PromotionBlocked, ReconcilerError};
use crate::crd::{Environment, PagesDeployment};
use crate::events::EventReason;
use crate::observability::metrics;
use crate::store::{update_deployment_with_retry, ObjectStore};
use kube::Resource;
use tracing::{debug, info, warn};

/// Result of a promote-and-demote pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionOutcome {
    /// The candidate's environment was flipped to production in this pass
    pub promoted: bool,
    /// Deployments flipped back to preview
    pub demoted: Vec<String>,
}

/// Set a deployment's environment to production
/// Returns whether a write happened
pub async fn promote_to_production(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    attempts: u32,
) -> Result<bool, ReconcilerError> {
    set_environment(store, namespace, name, attempts, Environment::Production).await
}

/// Set a deployment's environment to preview
/// Returns whether a write happened
pub async fn demote_to_preview(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    attempts: u32,
) -> Result<bool, ReconcilerError> {
    set_environment(store, namespace, name, attempts, Environment::Preview).await
}

async fn set_environment(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    attempts: u32,
    environment: Environment,
) -> Result<bool, ReconcilerError> {
    let updated = update_deployment_with_retry(store, namespace, name, attempts, |d| {
        if d.spec.environment == environment {
            return false;
        }
        d.spec.environment = environment;
        true
    })
    .await?;
    Ok(updated.is_some())
}

/// Preconditions the hosting backend needs before a promotion is meaningful
pub fn validate_for_promotion(deployment: &PagesDeployment) -> Result<(), PromotionBlocked> {
    let name = deployment.metadata.name.clone().unwrap_or_default();
    if !deployment.is_succeeded() {
        return Err(PromotionBlocked::NotSucceeded {
            deployment: name,
            state: deployment.state(),
        });
    }
    if deployment.external_id().is_none() {
        return Err(PromotionBlocked::MissingExternalId { deployment: name });
    }
    Ok(())
}

/// Drive the project toward exactly one production deployment: `candidate`
///
/// The promote is skipped when the candidate already is production or carries
/// the backend id recorded as current production. Other production deployments
/// are demoted only once the candidate holds production. Demotion failures are
/// collected and reported together after every demotion was attempted.
pub async fn promote_exclusive(
    ctx: &PassContext<'_>,
    index: &ReleaseIndex,
    candidate: &PagesDeployment,
    recorded_production_id: Option<&str>,
    reason: EventReason,
) -> Result<PromotionOutcome, ReconcilerError> {
    let mut outcome = PromotionOutcome::default();
    let candidate_name = candidate.metadata.name.clone().unwrap_or_default();
    let version = candidate.version_name().unwrap_or(&candidate_name).to_string();

    if !candidate.is_production() {
        if candidate.external_id().is_some() && candidate.external_id() == recorded_production_id {
            debug!(
                "Deployment {} is already the recorded production deployment, skipping promotion",
                candidate_name
            );
            return Ok(outcome);
        }

        outcome.promoted = promote_to_production(
            ctx.store,
            ctx.namespace(),
            &candidate_name,
            ctx.conflict_attempts,
        )
        .await?;

        if outcome.promoted {
            info!(
                "Promoted deployment {} (version {}) to production for project {}",
                candidate_name,
                version,
                ctx.identity.key()
            );
            metrics::increment_promotions(ctx.identity.policy.as_str());
            let note = format!("Promoted version {version} ({candidate_name}) to production");
            ctx.event_for(&candidate.object_ref(&()), reason, note.clone())
                .await;
            ctx.project_event(reason, note).await;
        }
    }

    let mut failures = Vec::new();
    for other in index.production() {
        let other_name = other.metadata.name.clone().unwrap_or_default();
        if other_name == candidate_name {
            continue;
        }
        match demote_to_preview(ctx.store, ctx.namespace(), &other_name, ctx.conflict_attempts)
            .await
        {
            Ok(true) => {
                info!("Demoted deployment {} to preview", other_name);
                metrics::increment_demotions(ctx.identity.policy.as_str());
                ctx.event_for(
                    &other.object_ref(&()),
                    EventReason::ProductionDemoted,
                    format!(
                        "Demoted {} to preview in favour of version {version}",
                        other.version_name().unwrap_or(&other_name)
                    ),
                )
                .await;
                outcome.demoted.push(other_name);
            }
            Ok(false) => {}
            Err(ReconcilerError::NotFound(_)) => {
                debug!("Deployment {} disappeared before demotion", other_name);
            }
            Err(e) => {
                warn!("Failed to demote deployment {}: {}", other_name, e);
                failures.push(format!("demote {other_name}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        Ok(outcome)
    } else {
        Err(ReconcilerError::PartialFailure(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        ArchiveSource, DeploymentState, PagesDeploymentSpec, PagesDeploymentStatus, ProjectRef,
    };
    use std::collections::BTreeMap;

    fn deployment(state: Option<DeploymentState>, id: Option<&str>) -> PagesDeployment {
        let mut d = PagesDeployment::new(
            "docs-v3",
            PagesDeploymentSpec {
                project_ref: ProjectRef::default(),
                version_name: "v3".to_string(),
                environment: Environment::Preview,
                source: ArchiveSource::default(),
                version_metadata: BTreeMap::new(),
            },
        );
        d.status = Some(PagesDeploymentStatus {
            state,
            deployment_id: id.map(str::to_string),
            ..Default::default()
        });
        d
    }

    #[test]
    fn test_failed_deployment_is_not_promotable() {
        let err = validate_for_promotion(&deployment(Some(DeploymentState::Failed), Some("id")))
            .unwrap_err();
        assert_eq!(
            err,
            PromotionBlocked::NotSucceeded {
                deployment: "docs-v3".to_string(),
                state: Some(DeploymentState::Failed),
            }
        );
    }

    #[test]
    fn test_missing_external_id_blocks_promotion() {
        let err =
            validate_for_promotion(&deployment(Some(DeploymentState::Succeeded), None)).unwrap_err();
        assert!(matches!(err, PromotionBlocked::MissingExternalId { .. }));
    }

    #[test]
    fn test_succeeded_with_id_is_promotable() {
        assert!(
            validate_for_promotion(&deployment(Some(DeploymentState::Succeeded), Some("id")))
                .is_ok()
        );
    }
}
