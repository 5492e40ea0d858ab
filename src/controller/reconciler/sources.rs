//! # Source Resolution
//!
//! Turns declared versions into concrete build sources and derives the
//! deterministic object name of the deployment that materializes each one.
//!
//! A version either carries an explicit `source` or is rendered from the
//! project's `sourceTemplate`. Rendering happens once per pass.

use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{ArchiveSource, CredentialsRef, PagesProject, VersionSpec};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").ok());

/// Kubernetes object name limit
const MAX_OBJECT_NAME: usize = 253;

/// Two separators plus the source fingerprint
const NAME_SUFFIX_OVERHEAD: usize = 10;

/// A declared version with its build source resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub name: String,
    pub source: ArchiveSource,
    pub metadata: BTreeMap<String, String>,
}

/// Resolve one declared version against the project's template
pub fn resolve_version(
    project: &PagesProject,
    version: &VersionSpec,
) -> Result<ResolvedVersion, ReconcilerError> {
    let source = match (&version.source, &project.spec.source_template) {
        (Some(explicit), _) => explicit.clone(),
        (None, Some(template)) => render_source(template, project.external_name(), version)?,
        (None, None) => {
            return Err(ReconcilerError::invalid_spec(format!(
                "version {} declares no source and the project has no sourceTemplate",
                version.name
            )))
        }
    };
    Ok(ResolvedVersion {
        name: version.name.clone(),
        source,
        metadata: version.metadata.clone(),
    })
}

/// Resolve the named declared versions, preserving the order given
pub fn resolve_versions<'a, I>(
    project: &PagesProject,
    names: I,
) -> Result<Vec<ResolvedVersion>, ReconcilerError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut resolved = Vec::new();
    for name in names {
        if resolved.iter().any(|r: &ResolvedVersion| r.name == name) {
            continue;
        }
        let declared = project.declared_version(name).ok_or_else(|| {
            ReconcilerError::NotFound(format!("version {name} is not declared in spec.versions"))
        })?;
        resolved.push(resolve_version(project, declared)?);
    }
    Ok(resolved)
}

/// Resolve every declared version in manifest order
pub fn resolve_all_versions(project: &PagesProject) -> Result<Vec<ResolvedVersion>, ReconcilerError> {
    project
        .spec
        .versions
        .iter()
        .map(|v| resolve_version(project, v))
        .collect()
}

fn render_source(
    template: &ArchiveSource,
    project_name: &str,
    version: &VersionSpec,
) -> Result<ArchiveSource, ReconcilerError> {
    let render = |value: &str| render_template(value, project_name, version);
    Ok(ArchiveSource {
        url: render(&template.url)?,
        checksum: template.checksum.as_deref().map(render).transpose()?,
        credentials_ref: template
            .credentials_ref
            .as_ref()
            .map(|c| -> Result<CredentialsRef, ReconcilerError> {
                Ok(CredentialsRef {
                    name: render(&c.name)?,
                    key: c.key.as_deref().map(render).transpose()?,
                })
            })
            .transpose()?,
    })
}

/// Render `{{version}}`, `{{project}}` and `{{metadata.<key>}}` placeholders
pub fn render_template(
    template: &str,
    project_name: &str,
    version: &VersionSpec,
) -> Result<String, ReconcilerError> {
    let regex = PLACEHOLDER_REGEX
        .as_ref()
        .ok_or_else(|| ReconcilerError::invalid_spec("failed to compile placeholder regex"))?;

    let mut unresolved = Vec::new();
    let rendered = regex.replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[1];
        let value = match key {
            "version" => Some(version.name.as_str()),
            "project" => Some(project_name),
            _ => key
                .strip_prefix("metadata.")
                .and_then(|k| version.metadata.get(k))
                .map(String::as_str),
        };
        value.map_or_else(
            || {
                unresolved.push(key.to_string());
                String::new()
            },
            str::to_string,
        )
    });

    if unresolved.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(ReconcilerError::invalid_spec(format!(
            "sourceTemplate for version {} has unresolved placeholder(s): {}",
            version.name,
            unresolved.join(", ")
        )))
    }
}

/// Short, stable fingerprint of a build source
#[must_use]
pub fn source_fingerprint(source: &ArchiveSource) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.url.as_bytes());
    hasher.update([0]);
    hasher.update(source.checksum.as_deref().unwrap_or_default().as_bytes());
    hasher.update([0]);
    if let Some(credentials) = &source.credentials_ref {
        hasher.update(credentials.name.as_bytes());
        hasher.update([0]);
        hasher.update(credentials.key.as_deref().unwrap_or_default().as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

/// Object name for the deployment of `version` built from `source`
///
/// The fingerprint suffix keeps a recreated deployment from colliding with its
/// predecessor while the old object is still terminating.
#[must_use]
pub fn deployment_name(project_name: &str, version: &str, source: &ArchiveSource) -> String {
    let budget = MAX_OBJECT_NAME.saturating_sub(version.len() + NAME_SUFFIX_OVERHEAD);
    let prefix: String = project_name.chars().take(budget).collect();
    let prefix = prefix.trim_end_matches(['-', '.']);
    format!("{prefix}-{version}-{}", source_fingerprint(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PagesProjectSpec, VersionManagement};

    fn version(name: &str, metadata: &[(&str, &str)]) -> VersionSpec {
        VersionSpec {
            name: name.to_string(),
            source: None,
            metadata: metadata
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    fn project(template: Option<&str>, versions: Vec<VersionSpec>) -> PagesProject {
        PagesProject::new(
            "docs",
            PagesProjectSpec {
                project_name: Some("docs-site".to_string()),
                versions,
                source_template: template.map(|url| ArchiveSource {
                    url: url.to_string(),
                    ..Default::default()
                }),
                production_target: None,
                revision_history_limit: None,
                version_management: VersionManagement::Declarative,
                suspend: false,
            },
        )
    }

    #[test]
    fn test_template_renders_version_project_and_metadata() {
        let p = project(
            Some("s3://bundles/{{project}}/{{ version }}-{{metadata.commit}}.tar.gz"),
            vec![version("v1", &[("commit", "abc123")])],
        );
        let resolved = resolve_all_versions(&p).unwrap();
        assert_eq!(
            resolved[0].source.url,
            "s3://bundles/docs-site/v1-abc123.tar.gz"
        );
    }

    #[test]
    fn test_unresolved_placeholder_is_invalid_spec() {
        let p = project(
            Some("s3://bundles/{{metadata.commit}}.tar.gz"),
            vec![version("v1", &[])],
        );
        let err = resolve_all_versions(&p).unwrap_err();
        assert_eq!(err.kind(), "invalid_spec");
        assert!(err.to_string().contains("metadata.commit"));
    }

    #[test]
    fn test_explicit_source_wins_over_template() {
        let mut v = version("v1", &[]);
        v.source = Some(ArchiveSource {
            url: "https://cdn.example.com/v1.zip".to_string(),
            ..Default::default()
        });
        let p = project(Some("s3://bundles/{{version}}.tar.gz"), vec![v]);
        let resolved = resolve_all_versions(&p).unwrap();
        assert_eq!(resolved[0].source.url, "https://cdn.example.com/v1.zip");
    }

    #[test]
    fn test_missing_source_and_template() {
        let p = project(None, vec![version("v1", &[])]);
        assert_eq!(resolve_all_versions(&p).unwrap_err().kind(), "invalid_spec");
    }

    #[test]
    fn test_resolve_versions_reports_undeclared_names() {
        let p = project(Some("s3://b/{{version}}"), vec![version("v1", &[])]);
        let resolved = resolve_versions(&p, ["v1", "v1"]).unwrap();
        assert_eq!(resolved.len(), 1);
        let err = resolve_versions(&p, ["v9"]).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_deployment_name_fits_object_name_limit() {
        let project_name = "p".repeat(253);
        let version = "v".repeat(63);
        let name = deployment_name(&project_name, &version, &ArchiveSource::default());
        assert_eq!(name.len(), 253);
        assert!(name.starts_with(&"p".repeat(180)));
        assert!(name.contains(&format!("-{version}-")));

        let short = deployment_name("docs", "v1", &ArchiveSource::default());
        assert!(short.starts_with("docs-v1-"));
        assert_eq!(short.len(), "docs-v1-".len() + 8);
    }

    #[test]
    fn test_deployment_name_changes_with_source() {
        let a = ArchiveSource {
            url: "s3://b/v1.tar.gz".to_string(),
            ..Default::default()
        };
        let b = ArchiveSource {
            url: "s3://b/v1-rebuilt.tar.gz".to_string(),
            ..Default::default()
        };
        let name_a = deployment_name("docs", "v1", &a);
        assert!(name_a.starts_with("docs-v1-"));
        assert_eq!(name_a.len(), "docs-v1-".len() + 8);
        assert_eq!(name_a, deployment_name("docs", "v1", &a));
        assert_ne!(name_a, deployment_name("docs", "v1", &b));
    }
}
