//! External policy: an outside actor writes the version names into the spec.

use super::{plan_for_version, PolicyEngine, Resolution};
use crate::controller::reconciler::history::ValidationHistory;
use crate::controller::reconciler::promotion::validate_for_promotion;
use crate::controller::reconciler::release_index::ReleaseIndex;
use crate::controller::reconciler::sources::{resolve_all_versions, ResolvedVersion};
use crate::controller::reconciler::types::{PromotionBlocked, ReconcilerError};
use crate::controller::reconciler::validation::parse_kubernetes_duration;
use crate::crd::{ExternalPolicy, PagesDeployment, PagesProject, PolicyKind};
use crate::events::EventReason;

#[derive(Debug, Clone)]
pub struct ExternalEngine {
    config: ExternalPolicy,
}

impl ExternalEngine {
    #[must_use]
    pub fn new(config: ExternalPolicy) -> Self {
        Self { config }
    }
}

impl PolicyEngine for ExternalEngine {
    fn kind(&self) -> PolicyKind {
        PolicyKind::External
    }

    fn desired_versions(
        &self,
        project: &PagesProject,
    ) -> Result<Vec<ResolvedVersion>, ReconcilerError> {
        resolve_all_versions(project)
    }

    /// The named versions may not be declared; a name without a deployment is `NotFound`
    fn resolve(
        &self,
        _project: &PagesProject,
        index: &ReleaseIndex,
    ) -> Result<Resolution, ReconcilerError> {
        let requeue_after = parse_kubernetes_duration(&self.config.sync_interval)
            .map_err(|e| ReconcilerError::invalid_spec(format!("syncInterval: {e}")))?;
        if let Some(current) = self.config.current_version.as_deref() {
            if index.for_version(current).is_none() {
                return Err(ReconcilerError::NotFound(format!(
                    "no deployment exists for current version {current}"
                )));
            }
        }
        let production = self
            .config
            .production_version
            .as_deref()
            .map(|v| plan_for_version(index, v, EventReason::ProductionPromoted))
            .transpose()?;
        Ok(Resolution {
            preview: self.config.current_version.clone(),
            production,
            requeue_after: Some(requeue_after),
        })
    }

    fn gate(
        &self,
        _project: &PagesProject,
        _history: &ValidationHistory,
        candidate: &PagesDeployment,
    ) -> Result<(), PromotionBlocked> {
        validate_for_promotion(candidate)
    }
}
