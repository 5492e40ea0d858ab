//! # PagesProject Spec
//!
//! The release manifest owner: declared versions, production target and the
//! version management policy.

use crate::constants::{DEFAULT_REVISION_HISTORY_LIMIT, PRODUCTION_TARGET_LATEST};
use crate::crd::{ArchiveSource, VersionManagement, VersionSpec};
use serde::{Deserialize, Serialize};

/// PagesProject Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: pages.octopilot.io/v1alpha1
/// kind: PagesProject
/// metadata:
///   name: docs-site
///   namespace: web
/// spec:
///   projectName: docs-site
///   sourceTemplate:
///     url: s3://site-bundles/docs/{{version}}.tar.gz
///   versions:
///     - name: v2
///     - name: v1
///   productionTarget: latest
///   revisionHistoryLimit: 5
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "PagesProject",
    group = "pages.octopilot.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::PagesProjectStatus",
    shortname = "pp",
    printcolumn = r#"{"name":"Policy", "type":"string", "jsonPath":".status.activePolicy"}, {"name":"Production", "type":"string", "jsonPath":".status.currentProduction.version"}, {"name":"Deployments", "type":"integer", "jsonPath":".status.managedDeployments"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PagesProjectSpec {
    /// Stable project name on the hosting backend
    /// Defaults to `metadata.name` when not specified
    #[serde(default)]
    pub project_name: Option<String>,
    /// Declared versions, newest first by convention
    /// `productionTarget: latest` resolves to the first entry
    #[serde(default)]
    pub versions: Vec<VersionSpec>,
    /// Template rendered for versions that do not declare an explicit source
    #[serde(default)]
    pub source_template: Option<ArchiveSource>,
    /// Version name that should hold production, or "latest"
    #[serde(default)]
    pub production_target: Option<String>,
    /// Number of deployments retained per project
    /// Default: 10
    #[serde(default)]
    pub revision_history_limit: Option<u32>,
    /// Version management policy
    /// Default: declarative
    #[serde(default)]
    pub version_management: VersionManagement,
    /// Suspend reconciliation
    /// When true, the controller will skip reconciliation for this project
    /// Default: false
    #[serde(default = "default_false")]
    pub suspend: bool,
}

impl PagesProject {
    /// Resolved external project name (`spec.projectName`, falling back to `metadata.name`)
    #[must_use]
    pub fn external_name(&self) -> &str {
        self.spec
            .project_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.metadata.name.as_deref())
            .unwrap_or_default()
    }

    /// Effective retention limit
    #[must_use]
    pub fn revision_history_limit(&self) -> usize {
        self.spec
            .revision_history_limit
            .map_or(DEFAULT_REVISION_HISTORY_LIMIT, |l| l as usize)
    }

    /// Resolve `spec.productionTarget`, mapping "latest" to the first declared version
    #[must_use]
    pub fn resolved_production_target(&self) -> Option<&str> {
        match self.spec.production_target.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(PRODUCTION_TARGET_LATEST) => self.spec.versions.first().map(|v| v.name.as_str()),
            Some(name) => Some(name),
        }
    }

    /// Look up a declared version by name
    #[must_use]
    pub fn declared_version(&self, name: &str) -> Option<&VersionSpec> {
        self.spec.versions.iter().find(|v| v.name == name)
    }
}

/// Default value for boolean true
#[must_use]
pub fn default_true() -> bool {
    true
}

/// Default value for boolean false
#[must_use]
pub fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(target: Option<&str>, versions: &[&str]) -> PagesProject {
        let mut p = PagesProject::new(
            "docs",
            PagesProjectSpec {
                project_name: None,
                versions: versions
                    .iter()
                    .map(|n| VersionSpec {
                        name: (*n).to_string(),
                        source: None,
                        metadata: std::collections::BTreeMap::new(),
                    })
                    .collect(),
                source_template: None,
                production_target: target.map(str::to_string),
                revision_history_limit: None,
                version_management: VersionManagement::Declarative,
                suspend: false,
            },
        );
        p.metadata.namespace = Some("web".to_string());
        p
    }

    #[test]
    fn test_latest_resolves_to_first_declared_version() {
        let p = project(Some("latest"), &["v1", "v2"]);
        assert_eq!(p.resolved_production_target(), Some("v1"));
    }

    #[test]
    fn test_explicit_target_is_returned_verbatim() {
        let p = project(Some("v2"), &["v1", "v2"]);
        assert_eq!(p.resolved_production_target(), Some("v2"));
    }

    #[test]
    fn test_latest_with_no_versions_resolves_to_none() {
        let p = project(Some("latest"), &[]);
        assert_eq!(p.resolved_production_target(), None);
    }

    #[test]
    fn test_external_name_falls_back_to_resource_name() {
        let mut p = project(None, &[]);
        assert_eq!(p.external_name(), "docs");
        p.spec.project_name = Some("docs-prod".to_string());
        assert_eq!(p.external_name(), "docs-prod");
    }

    #[test]
    fn test_revision_history_limit_defaults_to_ten() {
        let mut p = project(None, &[]);
        assert_eq!(p.revision_history_limit(), 10);
        p.spec.revision_history_limit = Some(2);
        assert_eq!(p.revision_history_limit(), 2);
    }
}
