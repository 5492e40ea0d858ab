//! # Status Aggregation
//!
//! Recomputes the externally visible project summary from the live
//! deployment set. Pure; writing happens in the parent module.

use super::phase::{
    ready_condition, with_ready_condition, PHASE_DEGRADED, PHASE_READY, PHASE_SUSPENDED,
};
use crate::controller::reconciler::release_index::{by_created_desc, ReleaseIndex};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{
    PagesDeployment, PagesProject, PagesProjectStatus, PolicyKind, ProductionInfo,
    ValidationRecord, VersionSummary,
};

/// Inputs the aggregator needs beyond the project and its deployments
#[derive(Debug, Clone)]
pub struct StatusInputs<'a> {
    pub policy: PolicyKind,
    /// Preview selected by the policy this pass; `None` keeps the previous value
    pub preview: Option<String>,
    pub history: Vec<ValidationRecord>,
    pub error: Option<&'a ReconcilerError>,
    /// RFC3339 timestamp of this pass
    pub now: String,
}

/// The succeeded production deployment; the newest wins while two coexist
#[must_use]
pub fn current_production(index: &ReleaseIndex) -> Option<ProductionInfo> {
    let mut production: Vec<&PagesDeployment> =
        index.production().filter(|d| d.is_succeeded()).collect();
    production.sort_by(|a, b| by_created_desc(a, b));
    production.first().map(|d| {
        let name = d.metadata.name.clone().unwrap_or_default();
        ProductionInfo {
            version: d.version_name().unwrap_or(&name).to_string(),
            deployment_name: name,
            deployment_id: d.external_id().map(str::to_string),
            url: d.status.as_ref().and_then(|s| s.url.clone()),
            finished_on: d.status.as_ref().and_then(|s| s.finished_on.clone()),
        }
    })
}

fn summarize(d: &PagesDeployment) -> VersionSummary {
    let name = d.metadata.name.clone().unwrap_or_default();
    VersionSummary {
        name: d.version_name().unwrap_or(&name).to_string(),
        deployment_name: name,
        state: d.state(),
        is_production: d.is_production(),
        deployment_id: d.external_id().map(str::to_string),
        last_transition_time: d.last_transition_time(),
    }
}

/// Compute the status a project should carry after this pass
#[must_use]
pub fn compute_status(
    project: &PagesProject,
    index: &ReleaseIndex,
    inputs: StatusInputs<'_>,
) -> PagesProjectStatus {
    let previous = project.status.as_ref();
    let current_production = current_production(index);

    // Only the declarative target is tracked; other policies keep what was recorded
    let target = project.resolved_production_target();
    let last_synced_version = match (&current_production, target) {
        (Some(prod), Some(target))
            if inputs.policy == PolicyKind::Declarative && prod.version == target =>
        {
            Some(target.to_string())
        }
        _ => previous.and_then(|s| s.last_synced_version.clone()),
    };

    let (phase, condition) = match inputs.error {
        Some(err) => (
            PHASE_DEGRADED,
            ready_condition(
                previous,
                false,
                err.condition_reason(),
                &err.to_string(),
                &inputs.now,
            ),
        ),
        None => {
            let message = match &current_production {
                Some(prod) => format!(
                    "{} deployment(s) managed, production is {}",
                    index.len(),
                    prod.version
                ),
                None => format!("{} deployment(s) managed, no production", index.len()),
            };
            (
                PHASE_READY,
                ready_condition(previous, true, "Reconciled", &message, &inputs.now),
            )
        }
    };

    PagesProjectStatus {
        phase: Some(phase.to_string()),
        description: condition.message.clone(),
        conditions: with_ready_condition(
            previous.map_or(&[][..], |s| s.conditions.as_slice()),
            condition,
        ),
        observed_generation: project.metadata.generation,
        last_reconcile_time: Some(inputs.now),
        active_policy: Some(inputs.policy.as_str().to_string()),
        managed_deployments: i32::try_from(index.len()).unwrap_or(i32::MAX),
        managed_versions: index.deployments().iter().map(summarize).collect(),
        current_production,
        current_preview: inputs
            .preview
            .or_else(|| previous.and_then(|s| s.current_preview.clone())),
        last_synced_version,
        validation_history: inputs.history,
    }
}

/// Status of a suspended project: everything kept, phase and condition replaced
#[must_use]
pub fn suspended_status(project: &PagesProject, now: &str) -> PagesProjectStatus {
    let previous = project.status.as_ref();
    let condition = ready_condition(
        previous,
        false,
        PHASE_SUSPENDED,
        "Reconciliation is suspended",
        now,
    );
    let mut status = previous.cloned().unwrap_or_default();
    status.conditions = with_ready_condition(&status.conditions, condition);
    status.phase = Some(PHASE_SUSPENDED.to_string());
    status.description = Some("Reconciliation is suspended".to_string());
    status.observed_generation = project.metadata.generation;
    status.last_reconcile_time = Some(now.to_string());
    status
}

/// Whether two statuses differ in anything other than `lastReconcileTime`
#[must_use]
pub fn status_differs(current: Option<&PagesProjectStatus>, desired: &PagesProjectStatus) -> bool {
    let Some(current) = current else {
        return true;
    };
    let mut a = current.clone();
    let mut b = desired.clone();
    a.last_reconcile_time = None;
    b.last_reconcile_time = None;
    a != b
}
