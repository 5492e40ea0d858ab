//! Latest-preview selection, shared by the LatestPreview and AutoPromote policies.

use super::{PolicyEngine, ProductionPlan, Resolution};
use crate::constants::BUILD_IN_PROGRESS_REQUEUE_SECS;
use crate::controller::reconciler::release_index::{by_created_desc, ReleaseIndex};
use crate::controller::reconciler::sources::{resolve_all_versions, ResolvedVersion};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{PagesDeployment, PagesProject, PolicyKind};
use crate::events::EventReason;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LatestPreviewEngine {
    selector: BTreeMap<String, String>,
    promote: bool,
    kind: PolicyKind,
}

impl LatestPreviewEngine {
    #[must_use]
    pub fn new(selector: BTreeMap<String, String>, promote: bool, kind: PolicyKind) -> Self {
        Self {
            selector,
            promote,
            kind,
        }
    }
}

/// Newest finish time first, deployments still without one last, then newest creation
fn by_latest(a: &PagesDeployment, b: &PagesDeployment) -> Ordering {
    let finish = match (a.finished_at(), b.finished_at()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    finish.then_with(|| by_created_desc(a, b))
}

/// The newest succeeded deployment among those matching `selector`
#[must_use]
pub fn select_latest<'a>(
    index: &'a ReleaseIndex,
    selector: &BTreeMap<String, String>,
) -> Option<&'a PagesDeployment> {
    let mut succeeded: Vec<&'a PagesDeployment> = index
        .deployments()
        .iter()
        .filter(|d| d.is_succeeded() && d.labels_match(selector))
        .collect();
    succeeded.sort_by(|a, b| by_latest(a, b));
    succeeded.into_iter().next()
}

impl PolicyEngine for LatestPreviewEngine {
    fn kind(&self) -> PolicyKind {
        self.kind
    }

    fn desired_versions(
        &self,
        project: &PagesProject,
    ) -> Result<Vec<ResolvedVersion>, ReconcilerError> {
        resolve_all_versions(project)
    }

    fn resolve(
        &self,
        _project: &PagesProject,
        index: &ReleaseIndex,
    ) -> Result<Resolution, ReconcilerError> {
        let Some(latest) = select_latest(index, &self.selector) else {
            let building = index
                .matching(&self.selector)
                .any(|d| !d.state().is_some_and(|s| s.is_terminal()));
            debug!(
                "No succeeded deployment matches the selector (building: {})",
                building
            );
            return Ok(Resolution {
                requeue_after: building
                    .then(|| Duration::from_secs(BUILD_IN_PROGRESS_REQUEUE_SECS)),
                ..Default::default()
            });
        };

        let name = latest.metadata.name.clone().unwrap_or_default();
        let version = latest.version_name().unwrap_or(&name).to_string();
        let reason = if self.kind == PolicyKind::AutoPromote {
            EventReason::AutoPromoted
        } else {
            EventReason::ProductionPromoted
        };
        Ok(Resolution {
            preview: Some(version.clone()),
            production: self.promote.then(|| ProductionPlan {
                version,
                deployment_name: name,
                reason,
            }),
            requeue_after: None,
        })
    }
}
