//! # PagesProject Validation
//!
//! Spec checks run before any object is touched.

use crate::constants::{MIN_EXTERNAL_SYNC_INTERVAL_SECS, PRODUCTION_TARGET_LATEST};
use crate::crd::{PagesProject, VersionManagement};
use anyhow::Result;
use std::collections::{BTreeMap, HashSet};

use super::duration::validate_duration_interval;
use super::kubernetes::{validate_kubernetes_label, validate_label_key, validate_label_value};

/// Validate a PagesProject resource
pub fn validate_pages_project(project: &PagesProject) -> Result<()> {
    let spec = &project.spec;

    let mut seen = HashSet::new();
    for version in &spec.versions {
        validate_kubernetes_label(&version.name, "versions[].name")?;
        if !seen.insert(version.name.as_str()) {
            return Err(anyhow::anyhow!(
                "version '{}' is declared more than once",
                version.name
            ));
        }
        if version.source.is_none() && spec.source_template.is_none() {
            return Err(anyhow::anyhow!(
                "version '{}' has no source and spec.sourceTemplate is not set",
                version.name
            ));
        }
        if let Some(source) = &version.source {
            if source.url.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "version '{}' has an empty source.url",
                    version.name
                ));
            }
        }
    }

    if let Some(template) = &spec.source_template {
        if template.url.trim().is_empty() {
            return Err(anyhow::anyhow!("sourceTemplate.url cannot be empty"));
        }
    }

    if let Some(target) = spec.production_target.as_deref().map(str::trim) {
        if !target.is_empty() && target != PRODUCTION_TARGET_LATEST && !seen.contains(target) {
            return Err(anyhow::anyhow!(
                "productionTarget '{target}' is not a declared version"
            ));
        }
    }

    if spec.revision_history_limit == Some(0) {
        return Err(anyhow::anyhow!("revisionHistoryLimit must be at least 1"));
    }

    match &spec.version_management {
        VersionManagement::Declarative => {}
        VersionManagement::GitOps(cfg) => {
            for (field, name) in [
                ("previewVersion", &cfg.preview_version),
                ("productionVersion", &cfg.production_version),
            ] {
                if let Some(name) = name {
                    if !seen.contains(name.as_str()) {
                        return Err(anyhow::anyhow!(
                            "versionManagement.{field} '{name}' is not a declared version"
                        ));
                    }
                }
            }
            validate_selector(&cfg.validation_labels, "versionManagement.validationLabels")?;
        }
        VersionManagement::LatestPreview(cfg) => {
            validate_selector(&cfg.selector, "versionManagement.selector")?;
        }
        VersionManagement::AutoPromote(cfg) => {
            validate_selector(&cfg.selector, "versionManagement.selector")?;
        }
        VersionManagement::External(cfg) => {
            validate_duration_interval(
                &cfg.sync_interval,
                "versionManagement.syncInterval",
                MIN_EXTERNAL_SYNC_INTERVAL_SECS,
            )?;
            // Names are owned by the outside actor and may run ahead of spec.versions
            for name in [&cfg.current_version, &cfg.production_version]
                .into_iter()
                .flatten()
            {
                validate_kubernetes_label(name, "versionManagement version name")?;
            }
        }
    }

    Ok(())
}

fn validate_selector(selector: &BTreeMap<String, String>, field_name: &str) -> Result<()> {
    for (key, value) in selector {
        validate_label_key(key, field_name)?;
        validate_label_value(value, field_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        ArchiveSource, ExternalPolicy, GitOpsPolicy, LatestPreviewPolicy, PagesProjectSpec,
        VersionSpec,
    };

    fn project(versions: &[&str]) -> PagesProject {
        PagesProject::new(
            "docs",
            PagesProjectSpec {
                versions: versions
                    .iter()
                    .map(|n| VersionSpec {
                        name: (*n).to_string(),
                        source: None,
                        metadata: BTreeMap::new(),
                    })
                    .collect(),
                source_template: Some(ArchiveSource {
                    url: "s3://b/{{version}}.tar.gz".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_valid_declarative_project() {
        let mut p = project(&["v1", "v2"]);
        p.spec.production_target = Some("latest".to_string());
        assert!(validate_pages_project(&p).is_ok());
        p.spec.production_target = Some("v2".to_string());
        assert!(validate_pages_project(&p).is_ok());
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        assert!(validate_pages_project(&project(&["v1", "v1"])).is_err());
        assert!(validate_pages_project(&project(&["V1"])).is_err());
    }

    #[test]
    fn test_undeclared_production_target() {
        let mut p = project(&["v1"]);
        p.spec.production_target = Some("v9".to_string());
        let err = validate_pages_project(&p).unwrap_err();
        assert!(err.to_string().contains("v9"));
    }

    #[test]
    fn test_missing_source() {
        let mut p = project(&["v1"]);
        p.spec.source_template = None;
        assert!(validate_pages_project(&p).is_err());
    }

    #[test]
    fn test_zero_history_limit() {
        let mut p = project(&["v1"]);
        p.spec.revision_history_limit = Some(0);
        assert!(validate_pages_project(&p).is_err());
    }

    #[test]
    fn test_gitops_names_must_be_declared() {
        let mut p = project(&["v1", "v2"]);
        p.spec.version_management = VersionManagement::GitOps(GitOpsPolicy {
            preview_version: Some("v3".to_string()),
            production_version: Some("v1".to_string()),
            require_preview_validation: true,
            validation_labels: BTreeMap::new(),
        });
        assert!(validate_pages_project(&p).is_err());
    }

    #[test]
    fn test_selector_must_be_valid() {
        let mut p = project(&["v1"]);
        p.spec.version_management = VersionManagement::LatestPreview(LatestPreviewPolicy {
            selector: BTreeMap::from([("channel".to_string(), "beta!".to_string())]),
            auto_promote: false,
        });
        assert!(validate_pages_project(&p).is_err());
    }

    #[test]
    fn test_external_sync_interval_minimum() {
        let mut p = project(&["v1"]);
        p.spec.version_management = VersionManagement::External(ExternalPolicy {
            sync_interval: "10s".to_string(),
            ..Default::default()
        });
        assert!(validate_pages_project(&p).is_err());

        p.spec.version_management = VersionManagement::External(ExternalPolicy {
            production_version: Some("v7".to_string()),
            sync_interval: "1m".to_string(),
            ..Default::default()
        });
        assert!(validate_pages_project(&p).is_ok());
    }
}
