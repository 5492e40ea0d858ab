//! # Release Set
//!
//! Converges the desired versions to exactly one deployment object per version.
//!
//! Deployments are immutable once created: when a version's resolved source no
//! longer matches, the old object is deleted and a replacement is created.
//! Versions that dropped out of the desired set are left alone; the pruner
//! decides when they go.

use crate::constants::{ANNOTATION_CREATED_AT, LABEL_VERSION};
use crate::controller::reconciler::context::PassContext;
use crate::controller::reconciler::sources::{deployment_name, ResolvedVersion};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{Environment, PagesDeployment, PagesDeploymentSpec, ProjectRef};
use crate::events::EventReason;
use crate::observability::metrics;
use crate::store::{update_deployment_with_retry, StoreError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What a release set pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSetOutcome {
    /// Versions that got their first deployment
    pub created: Vec<String>,
    /// Versions whose deployment was replaced because the source changed
    pub recreated: Vec<String>,
    /// Versions already converged
    pub unchanged: Vec<String>,
}

impl ReleaseSetOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.created.is_empty() || !self.recreated.is_empty()
    }
}

/// Converge `desired` against the deployments carrying this project's managed-by labels
pub async fn reconcile_release_set(
    ctx: &PassContext<'_>,
    desired: &[ResolvedVersion],
) -> Result<ReleaseSetOutcome, ReconcilerError> {
    let mut outcome = ReleaseSetOutcome::default();
    if desired.is_empty() {
        return Ok(outcome);
    }

    let managed = ctx
        .store
        .list_deployments(ctx.namespace(), &ctx.identity.managed_labels())
        .await?;

    for version in desired {
        let existing: Vec<&PagesDeployment> = managed
            .iter()
            .filter(|d| d.version_name() == Some(version.name.as_str()))
            .collect();

        if existing.iter().any(|d| d.spec.source == version.source) {
            // Stale duplicates from an interrupted recreate
            for stale in existing.iter().filter(|d| d.spec.source != version.source) {
                delete_fire_and_forget(ctx, stale).await;
            }
            outcome.unchanged.push(version.name.clone());
            continue;
        }

        let replacing = !existing.is_empty();
        for old in &existing {
            info!(
                "Source of version {} changed, replacing deployment {}",
                version.name,
                old.metadata.name.as_deref().unwrap_or_default()
            );
            delete_fire_and_forget(ctx, old).await;
        }

        if create_deployment(ctx, version).await? {
            if replacing {
                metrics::increment_deployments_recreated();
                ctx.project_event(
                    EventReason::Recreated,
                    format!("Recreated deployment for version {} with new source", version.name),
                )
                .await;
                outcome.recreated.push(version.name.clone());
            } else {
                metrics::increment_deployments_created();
                ctx.project_event(
                    EventReason::Created,
                    format!("Created deployment for version {}", version.name),
                )
                .await;
                outcome.created.push(version.name.clone());
            }
        } else {
            outcome.unchanged.push(version.name.clone());
        }
    }

    Ok(outcome)
}

/// Build the deployment object that materializes `version`
#[must_use]
pub fn build_deployment(ctx: &PassContext<'_>, version: &ResolvedVersion) -> PagesDeployment {
    let name = deployment_name(&ctx.identity.name, &version.name, &version.source);
    let mut labels = ctx.identity.managed_labels();
    labels.insert(LABEL_VERSION.to_string(), version.name.clone());

    let mut deployment = PagesDeployment::new(
        &name,
        PagesDeploymentSpec {
            project_ref: ProjectRef {
                name: Some(ctx.identity.name.clone()),
                external_name: Some(ctx.identity.external_name.clone()),
            },
            version_name: version.name.clone(),
            environment: Environment::Preview,
            source: version.source.clone(),
            version_metadata: version.metadata.clone(),
        },
    );
    deployment.metadata.namespace = Some(ctx.identity.namespace.clone());
    deployment.metadata.labels = Some(labels);
    deployment.metadata.annotations = Some(BTreeMap::from([(
        ANNOTATION_CREATED_AT.to_string(),
        chrono::Utc::now().to_rfc3339(),
    )]));
    if let Some(owner) = owner_reference(ctx) {
        deployment.metadata.owner_references = Some(vec![owner]);
    }
    deployment
}

fn owner_reference(ctx: &PassContext<'_>) -> Option<OwnerReference> {
    let uid = ctx.identity.uid.clone()?;
    Some(OwnerReference {
        api_version: crate::crd::PagesProject::api_version(&()).into_owned(),
        kind: crate::crd::PagesProject::kind(&()).into_owned(),
        name: ctx.identity.name.clone(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// Create the deployment for `version`; returns false when an identical one already exists
async fn create_deployment(
    ctx: &PassContext<'_>,
    version: &ResolvedVersion,
) -> Result<bool, ReconcilerError> {
    let deployment = build_deployment(ctx, version);
    let name = deployment.metadata.name.clone().unwrap_or_default();
    match ctx.store.create_deployment(&deployment).await {
        Ok(_) => {
            info!(
                "Created deployment {} for version {} of project {}",
                name,
                version.name,
                ctx.identity.key()
            );
            Ok(true)
        }
        Err(StoreError::AlreadyExists { .. }) => {
            // Same name means same source; adopt it by refreshing the managed-by labels
            debug!("Deployment {} already exists, adopting", name);
            let wanted = deployment.metadata.labels.clone().unwrap_or_default();
            update_deployment_with_retry(
                ctx.store,
                ctx.namespace(),
                &name,
                ctx.conflict_attempts,
                |existing| {
                    let labels = existing.metadata.labels.get_or_insert_with(BTreeMap::new);
                    let mut changed = false;
                    for (k, v) in &wanted {
                        if labels.get(k) != Some(v) {
                            labels.insert(k.clone(), v.clone());
                            changed = true;
                        }
                    }
                    changed
                },
            )
            .await?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_fire_and_forget(ctx: &PassContext<'_>, deployment: &PagesDeployment) {
    let name = deployment.metadata.name.as_deref().unwrap_or_default();
    match ctx.store.delete_deployment(ctx.namespace(), name).await {
        Ok(()) => debug!("Deleted deployment {}", name),
        Err(e) if e.is_not_found() => debug!("Deployment {} already gone", name),
        Err(e) => warn!("Failed to delete deployment {}: {}", name, e),
    }
}
