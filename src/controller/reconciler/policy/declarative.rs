//! Declarative-target policy.

use super::{plan_for_version, PolicyEngine, Resolution};
use crate::controller::reconciler::release_index::ReleaseIndex;
use crate::controller::reconciler::sources::{resolve_all_versions, ResolvedVersion};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{PagesProject, PolicyKind};
use crate::events::EventReason;
use tracing::debug;

/// Materializes every declared version and promotes `spec.productionTarget`
///
/// No gate: the operator who edits the manifest owns the decision. Once the
/// target has been observed in production it is recorded as
/// `lastSyncedVersion`, and production is only re-asserted when the declared
/// target changes. A manual rollback on the backend is therefore left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeEngine;

impl PolicyEngine for DeclarativeEngine {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Declarative
    }

    fn desired_versions(
        &self,
        project: &PagesProject,
    ) -> Result<Vec<ResolvedVersion>, ReconcilerError> {
        resolve_all_versions(project)
    }

    fn resolve(
        &self,
        project: &PagesProject,
        index: &ReleaseIndex,
    ) -> Result<Resolution, ReconcilerError> {
        let target = project.resolved_production_target();
        let preview = project
            .spec
            .versions
            .iter()
            .map(|v| v.name.as_str())
            .find(|name| Some(*name) != target)
            .map(str::to_string);

        let Some(target) = target else {
            return Ok(Resolution {
                preview,
                ..Default::default()
            });
        };

        let last_synced = project
            .status
            .as_ref()
            .and_then(|s| s.last_synced_version.as_deref());
        // A manual rollback leaves another deployment in production; with none
        // left at all the target has to be asserted again.
        if last_synced == Some(target) && index.production().next().is_some() {
            debug!(
                "Production target {} already synced, leaving production alone",
                target
            );
            return Ok(Resolution {
                preview,
                ..Default::default()
            });
        }

        Ok(Resolution {
            preview,
            production: Some(plan_for_version(
                index,
                target,
                EventReason::ProductionPromoted,
            )?),
            requeue_after: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::context::ProjectIdentity;
    use crate::crd::{
        ArchiveSource, Environment, PagesDeployment, PagesDeploymentSpec, PagesProjectSpec,
        PagesProjectStatus, ProjectRef, VersionManagement, VersionSpec,
    };
    use std::collections::BTreeMap;

    fn project(target: &str, last_synced: Option<&str>) -> PagesProject {
        let mut p = PagesProject::new(
            "docs",
            PagesProjectSpec {
                project_name: None,
                versions: ["v1", "v2"]
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
                production_target: Some(target.to_string()),
                revision_history_limit: None,
                version_management: VersionManagement::Declarative,
                suspend: false,
            },
        );
        p.metadata.namespace = Some("web".to_string());
        p.status = Some(PagesProjectStatus {
            last_synced_version: last_synced.map(str::to_string),
            ..Default::default()
        });
        p
    }

    fn index_with(
        project: &PagesProject,
        versions: &[&str],
        production: Option<&str>,
    ) -> ReleaseIndex {
        let identity = ProjectIdentity::from_project(project);
        let listing = versions
            .iter()
            .map(|v| {
                let mut d = PagesDeployment::new(
                    &format!("docs-{v}"),
                    PagesDeploymentSpec {
                        project_ref: ProjectRef {
                            name: Some("docs".to_string()),
                            external_name: None,
                        },
                        version_name: (*v).to_string(),
                        environment: if production == Some(*v) {
                            Environment::Production
                        } else {
                            Environment::Preview
                        },
                        source: ArchiveSource::default(),
                        version_metadata: BTreeMap::new(),
                    },
                );
                d.metadata.namespace = Some("web".to_string());
                d
            })
            .collect();
        ReleaseIndex::build(&identity, listing)
    }

    #[test]
    fn test_latest_targets_first_declared_version() {
        let p = project("latest", None);
        let resolution = DeclarativeEngine
            .resolve(&p, &index_with(&p, &["v1", "v2"], None))
            .unwrap();
        let plan = resolution.production.unwrap();
        assert_eq!(plan.version, "v1");
        assert_eq!(plan.deployment_name, "docs-v1");
        assert_eq!(resolution.preview.as_deref(), Some("v2"));
    }

    #[test]
    fn test_synced_target_is_not_reasserted() {
        let p = project("v2", Some("v2"));
        let resolution = DeclarativeEngine
            .resolve(&p, &index_with(&p, &["v1", "v2"], Some("v1")))
            .unwrap();
        assert!(resolution.production.is_none());
        assert_eq!(resolution.preview.as_deref(), Some("v1"));
    }

    #[test]
    fn test_synced_target_is_reasserted_without_production() {
        let p = project("v2", Some("v2"));
        let resolution = DeclarativeEngine
            .resolve(&p, &index_with(&p, &["v1", "v2"], None))
            .unwrap();
        let plan = resolution.production.unwrap();
        assert_eq!(plan.version, "v2");
        assert_eq!(plan.deployment_name, "docs-v2");
    }

    #[test]
    fn test_changed_target_is_promoted_again() {
        let p = project("v1", Some("v2"));
        let resolution = DeclarativeEngine
            .resolve(&p, &index_with(&p, &["v1", "v2"], None))
            .unwrap();
        assert_eq!(resolution.production.unwrap().version, "v1");
    }

    #[test]
    fn test_missing_deployment_is_not_found() {
        let p = project("v2", None);
        let err = DeclarativeEngine
            .resolve(&p, &index_with(&p, &["v1"], None))
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
