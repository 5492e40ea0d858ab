//! # PagesProject Status
//!
//! Status types for tracking reconciliation state, the managed release set and
//! promotion bookkeeping.

use crate::crd::DeploymentState;
use serde::{Deserialize, Serialize};

/// Status of the PagesProject resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagesProjectStatus {
    /// Current phase of reconciliation
    /// Values: Pending, Reconciling, Ready, Degraded, Suspended, Terminating
    #[serde(default)]
    pub phase: Option<String>,
    /// Human-readable description of current state
    #[serde(default)]
    pub description: Option<String>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time (RFC3339)
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
    /// Tag of the policy engine that produced this status
    #[serde(default)]
    pub active_policy: Option<String>,
    /// Number of deployments owned by this project
    #[serde(default)]
    pub managed_deployments: i32,
    /// Per-version summary of the managed deployments
    #[serde(default)]
    pub managed_versions: Vec<VersionSummary>,
    /// The succeeded production deployment, if any
    #[serde(default)]
    pub current_production: Option<ProductionInfo>,
    /// Version currently selected as preview by the policy
    #[serde(default)]
    pub current_preview: Option<String>,
    /// Declared target version last observed as production
    /// While the declared target stays equal to this value the controller does not
    /// re-assert production, so a manual rollback on the backend is left alone
    #[serde(default)]
    pub last_synced_version: Option<String>,
    /// Promotions that passed their gate, newest first (bounded)
    #[serde(default)]
    pub validation_history: Vec<ValidationRecord>,
}

/// Summary of one managed version
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    /// Version name
    pub name: String,
    /// Name of the backing PagesDeployment
    pub deployment_name: String,
    /// Lifecycle state
    #[serde(default)]
    pub state: Option<DeploymentState>,
    /// Whether the deployment is in the production environment
    #[serde(default)]
    pub is_production: bool,
    /// Backend deployment identifier
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// Last condition transition time (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

/// Current production deployment record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductionInfo {
    /// Version name
    pub version: String,
    /// Name of the backing PagesDeployment
    pub deployment_name: String,
    /// Backend deployment identifier
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// Deployment URL
    #[serde(default)]
    pub url: Option<String>,
    /// Backend finish time (RFC3339)
    #[serde(default)]
    pub finished_on: Option<String>,
}

/// Audit entry recorded when a promotion succeeds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    /// Promoted version
    pub version: String,
    /// Backend deployment identifier of the promoted deployment
    #[serde(default)]
    pub deployment_id: String,
    /// Time of promotion (RFC3339)
    pub timestamp: String,
    /// Identity that validated the promotion (policy tag)
    pub validated_by: String,
    /// Result of the validation
    pub result: ValidationOutcome,
}

/// Outcome of a validation gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ValidationOutcome {
    Passed,
    Failed,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
