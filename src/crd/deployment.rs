//! # PagesDeployment
//!
//! One concrete, immutable build artifact tracked 1:1 against the hosting backend.
//! The spec is written by this controller; the status is mirrored from the
//! hosting backend by a downstream controller.

use crate::constants::{ANNOTATION_CREATED_AT, LABEL_VERSION};
use crate::crd::{ArchiveSource, Condition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// PagesDeployment Custom Resource Definition
///
/// The build source never changes after creation. A source change is modeled
/// as delete-then-recreate, never as an update.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "PagesDeployment",
    group = "pages.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::PagesDeploymentStatus",
    shortname = "pd",
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.versionName"}, {"name":"Environment", "type":"string", "jsonPath":".spec.environment"}, {"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"URL", "type":"string", "jsonPath":".status.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PagesDeploymentSpec {
    /// Owning project reference
    #[serde(default)]
    pub project_ref: ProjectRef,
    /// Version name this deployment materializes
    #[serde(default)]
    pub version_name: String,
    /// Declared environment; flipping this field is how promotion happens
    #[serde(default)]
    pub environment: Environment,
    /// Build source (immutable)
    pub source: ArchiveSource,
    /// Version metadata copied from the manifest
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub version_metadata: BTreeMap<String, String>,
}

/// Reference from a deployment to its project
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    /// PagesProject resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// External project name or identifier on the hosting backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
}

/// Deployment environment
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Preview,
    Production,
}

impl Environment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Preview => "preview",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state reported by the hosting backend
/// queued -> building -> {succeeded | failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    Queued,
    Building,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl DeploymentState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Queued => "queued",
            DeploymentState::Building => "building",
            DeploymentState::Succeeded => "succeeded",
            DeploymentState::Failed => "failed",
            DeploymentState::Unknown => "unknown",
        }
    }

    /// Whether the backend has finished with this deployment
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentState::Succeeded | DeploymentState::Failed)
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status mirrored from the hosting backend
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PagesDeploymentStatus {
    /// Version name as recorded by the downstream controller
    #[serde(default)]
    pub version_name: Option<String>,
    /// External project name as recorded by the downstream controller
    #[serde(default)]
    pub project_name: Option<String>,
    /// Backend-assigned deployment identifier; empty until the backend accepts the request
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// Lifecycle state
    #[serde(default)]
    pub state: Option<DeploymentState>,
    /// Primary URL of the deployment
    #[serde(default)]
    pub url: Option<String>,
    /// Backend creation time (RFC3339)
    #[serde(default)]
    pub created_on: Option<String>,
    /// Backend finish time (RFC3339)
    #[serde(default)]
    pub finished_on: Option<String>,
    /// Conditions reported by the downstream controller
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl PagesDeployment {
    /// Version name, read from spec, then status, then label
    /// Tolerates partial writes where some of the three are unset
    #[must_use]
    pub fn version_name(&self) -> Option<&str> {
        let from_spec = Some(self.spec.version_name.as_str()).filter(|v| !v.is_empty());
        let from_status = self
            .status
            .as_ref()
            .and_then(|s| s.version_name.as_deref())
            .filter(|v| !v.is_empty());
        let from_label = self
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(LABEL_VERSION))
            .map(String::as_str)
            .filter(|v| !v.is_empty());
        from_spec.or(from_status).or(from_label)
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.spec.environment
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.spec.environment == Environment::Production
    }

    #[must_use]
    pub fn state(&self) -> Option<DeploymentState> {
        self.status.as_ref().and_then(|s| s.state)
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.state() == Some(DeploymentState::Succeeded)
    }

    /// Backend deployment identifier, if one has been assigned
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.deployment_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Creation time: backend-reported, falling back to the controller's creation stamp
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.status
            .as_ref()
            .and_then(|s| s.created_on.as_deref())
            .and_then(parse_timestamp)
            .or_else(|| {
                self.metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(ANNOTATION_CREATED_AT))
                    .and_then(|ts| parse_timestamp(ts))
            })
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.status
            .as_ref()
            .and_then(|s| s.finished_on.as_deref())
            .and_then(parse_timestamp)
    }

    /// Last condition transition time reported by the downstream controller
    #[must_use]
    pub fn last_transition_time(&self) -> Option<String> {
        self.status.as_ref().and_then(|s| {
            s.conditions
                .iter()
                .filter_map(|c| c.last_transition_time.clone())
                .max()
        })
    }

    #[must_use]
    pub fn labels_match(&self, selector: &BTreeMap<String, String>) -> bool {
        let labels = self.metadata.labels.as_ref();
        selector
            .iter()
            .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
