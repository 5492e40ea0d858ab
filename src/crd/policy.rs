//! # Version Management Policies
//!
//! Exactly one policy engine drives a project. The policy is selected by the
//! `policy` discriminator and each variant carries only its own parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Version management configuration
///
/// # Example
///
/// ```yaml
/// versionManagement:
///   policy: gitops
///   previewVersion: v2
///   productionVersion: v1
///   requirePreviewValidation: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", tag = "policy")]
pub enum VersionManagement {
    /// Materialize every declared version; production is `spec.productionTarget`
    #[default]
    Declarative,
    /// Explicit preview and production version names, gated by validation
    #[serde(rename = "gitops")]
    GitOps(GitOpsPolicy),
    /// Newest succeeded deployment matching a label selector becomes current
    LatestPreview(LatestPreviewPolicy),
    /// Latest-preview selection that always promotes once the build succeeds
    AutoPromote(AutoPromotePolicy),
    /// Version names are written into the spec by an outside actor
    External(ExternalPolicy),
}

impl VersionManagement {
    /// Tag of the selected policy
    #[must_use]
    pub fn kind(&self) -> PolicyKind {
        match self {
            VersionManagement::Declarative => PolicyKind::Declarative,
            VersionManagement::GitOps(_) => PolicyKind::GitOps,
            VersionManagement::LatestPreview(_) => PolicyKind::LatestPreview,
            VersionManagement::AutoPromote(_) => PolicyKind::AutoPromote,
            VersionManagement::External(_) => PolicyKind::External,
        }
    }
}

/// GitOps policy parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsPolicy {
    /// Version deployed as preview; created if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_version: Option<String>,
    /// Version that should hold production
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_version: Option<String>,
    /// Require a validation record (or a succeeded preview) before promoting
    /// Default: true
    #[serde(default = "crate::crd::default_true")]
    pub require_preview_validation: bool,
    /// Labels the candidate deployment must carry before it may be promoted
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validation_labels: BTreeMap<String, String>,
}

/// Latest-preview policy parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LatestPreviewPolicy {
    /// Equality label selector applied to the project's deployments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    /// Promote the selected deployment to production
    /// Default: false
    #[serde(default = "crate::crd::default_false")]
    pub auto_promote: bool,
}

/// Auto-promote policy parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoPromotePolicy {
    /// Equality label selector applied to the project's deployments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
}

/// External policy parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalPolicy {
    /// Current (preview) version, set by an outside actor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    /// Production version, set by an outside actor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_version: Option<String>,
    /// How often to re-check the externally written version names
    /// Format: Kubernetes duration string (e.g., "30s", "5m")
    /// Default: "5m"
    #[serde(default = "default_sync_interval")]
    pub sync_interval: String,
}

impl Default for ExternalPolicy {
    fn default() -> Self {
        Self {
            current_version: None,
            production_version: None,
            sync_interval: default_sync_interval(),
        }
    }
}

fn default_sync_interval() -> String {
    crate::constants::DEFAULT_EXTERNAL_SYNC_INTERVAL.to_string()
}

/// Policy tag recorded in `status.activePolicy` and on managed-by labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Declarative,
    GitOps,
    LatestPreview,
    AutoPromote,
    External,
}

impl PolicyKind {
    /// Label-safe string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Declarative => "declarative",
            PolicyKind::GitOps => "gitops",
            PolicyKind::LatestPreview => "latest-preview",
            PolicyKind::AutoPromote => "auto-promote",
            PolicyKind::External => "external",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
