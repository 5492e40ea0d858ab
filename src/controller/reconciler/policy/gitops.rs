//! GitOps policy: explicit preview and production version names.

use super::{plan_for_version, PolicyEngine, Resolution};
use crate::controller::reconciler::history::ValidationHistory;
use crate::controller::reconciler::release_index::ReleaseIndex;
use crate::controller::reconciler::sources::{resolve_versions, ResolvedVersion};
use crate::controller::reconciler::types::{PromotionBlocked, ReconcilerError};
use crate::crd::{GitOpsPolicy, PagesDeployment, PagesProject, PolicyKind};
use crate::events::EventReason;

#[derive(Debug, Clone)]
pub struct GitOpsEngine {
    config: GitOpsPolicy,
}

impl GitOpsEngine {
    #[must_use]
    pub fn new(config: GitOpsPolicy) -> Self {
        Self { config }
    }

    fn named_versions(&self) -> impl Iterator<Item = &str> {
        self.config
            .preview_version
            .as_deref()
            .into_iter()
            .chain(self.config.production_version.as_deref())
    }
}

impl PolicyEngine for GitOpsEngine {
    fn kind(&self) -> PolicyKind {
        PolicyKind::GitOps
    }

    /// Only the preview and production versions are materialized
    fn desired_versions(
        &self,
        project: &PagesProject,
    ) -> Result<Vec<ResolvedVersion>, ReconcilerError> {
        resolve_versions(project, self.named_versions())
    }

    fn resolve(
        &self,
        _project: &PagesProject,
        index: &ReleaseIndex,
    ) -> Result<Resolution, ReconcilerError> {
        let production = self
            .config
            .production_version
            .as_deref()
            .map(|v| plan_for_version(index, v, EventReason::ProductionPromoted))
            .transpose()?;
        Ok(Resolution {
            preview: self.config.preview_version.clone(),
            production,
            requeue_after: None,
        })
    }

    /// Succeeded, then validated, then labelled
    ///
    /// A version counts as validated when the history holds a passed record for
    /// its exact backend id, or when it is the version served as preview.
    fn gate(
        &self,
        project: &PagesProject,
        history: &ValidationHistory,
        candidate: &PagesDeployment,
    ) -> Result<(), PromotionBlocked> {
        let name = candidate.metadata.name.clone().unwrap_or_default();
        if !candidate.is_succeeded() {
            return Err(PromotionBlocked::NotSucceeded {
                deployment: name,
                state: candidate.state(),
            });
        }

        let version = candidate.version_name().unwrap_or_default();
        if self.config.require_preview_validation {
            let history_hit = candidate
                .external_id()
                .is_some_and(|id| history.contains_passed(version, id));
            let is_spec_preview = self.config.preview_version.as_deref() == Some(version);
            let was_current_preview = project
                .status
                .as_ref()
                .and_then(|s| s.current_preview.as_deref())
                == Some(version);
            if !(history_hit || is_spec_preview || was_current_preview) {
                return Err(PromotionBlocked::MissingValidation {
                    version: version.to_string(),
                });
            }
        }

        let missing: Vec<String> = self
            .config
            .validation_labels
            .iter()
            .filter(|(k, v)| {
                candidate
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(*k))
                    != Some(*v)
            })
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if !missing.is_empty() {
            return Err(PromotionBlocked::MissingLabels {
                deployment: name,
                missing,
            });
        }
        Ok(())
    }
}
