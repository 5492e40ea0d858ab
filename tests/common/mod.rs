//! Common test utilities for reconciliation tests
//!
//! Builds projects and deployments, drives passes against the in-memory store
//! and plays the downstream backend controller by writing deployment status.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use kube::api::ObjectMeta;
use kube_runtime::controller::Action;
use pages_release_controller::constants::{ANNOTATION_CREATED_AT, LABEL_MANAGED_BY_NAME, LABEL_VERSION};
use pages_release_controller::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "web";
pub const PROJECT: &str = "docs";

/// Store, event recorder and reconciler wired together
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub events: Arc<RecordingEvents>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(RecordingEvents::new());
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&events) as Arc<dyn EventSink>,
            ControllerConfig::default(),
        ));
        Self {
            store,
            events,
            reconciler,
        }
    }

    pub fn with_project(spec: PagesProjectSpec) -> Self {
        let harness = Self::new();
        harness.store.insert_project(project(spec));
        harness
    }

    pub async fn project(&self) -> PagesProject {
        self.store
            .get_project(NAMESPACE, PROJECT)
            .await
            .expect("project should exist")
    }

    pub async fn status(&self) -> PagesProjectStatus {
        self.project()
            .await
            .status
            .expect("project should have a status")
    }

    /// Run one reconciliation pass against the stored project
    pub async fn pass(&self) -> Result<Action, ReconcilerError> {
        let project = self.project().await;
        reconcile(
            Arc::new(project),
            Arc::clone(&self.reconciler),
            TriggerSource::WatchEvent,
        )
        .await
    }

    /// Rewrite the stored project's spec
    pub async fn edit_spec(&self, edit: impl FnOnce(&mut PagesProjectSpec)) {
        let mut project = self.project().await;
        edit(&mut project.spec);
        self.store
            .replace_project(&project)
            .await
            .expect("project update should succeed");
    }

    pub fn deployments(&self) -> Vec<PagesDeployment> {
        self.store.deployments(NAMESPACE)
    }

    /// The single deployment materializing `version`
    pub fn deployment_for(&self, version: &str) -> PagesDeployment {
        let mut matching: Vec<_> = self
            .deployments()
            .into_iter()
            .filter(|d| d.version_name() == Some(version))
            .collect();
        assert_eq!(
            matching.len(),
            1,
            "expected exactly one deployment for version {version}"
        );
        matching.remove(0)
    }

    /// Versions whose deployment is declared production, sorted
    pub fn production_versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self
            .deployments()
            .iter()
            .filter(|d| d.is_production())
            .filter_map(|d| d.version_name().map(str::to_string))
            .collect();
        versions.sort();
        versions
    }

    /// Report a finished build for `version`, the way the backend controller does
    pub fn complete(&self, version: &str, deployment_id: &str, finished_on: &str) {
        self.set_state(version, deployment_id, DeploymentState::Succeeded, finished_on);
    }

    pub fn set_state(
        &self,
        version: &str,
        deployment_id: &str,
        state: DeploymentState,
        finished_on: &str,
    ) {
        let deployment = self.deployment_for(version);
        let name = deployment.metadata.name.clone().unwrap_or_default();
        self.store
            .set_deployment_status(
                NAMESPACE,
                &name,
                PagesDeploymentStatus {
                    version_name: Some(version.to_string()),
                    project_name: Some(PROJECT.to_string()),
                    deployment_id: Some(deployment_id.to_string()),
                    state: Some(state),
                    url: Some(format!("https://{deployment_id}.{PROJECT}.pages.dev")),
                    created_on: None,
                    finished_on: Some(finished_on.to_string()),
                    conditions: Vec::new(),
                },
            )
            .expect("deployment should exist");
    }

    /// Flip a deployment's environment behind the controller's back
    pub async fn set_environment(&self, version: &str, environment: Environment) {
        let mut deployment = self.deployment_for(version);
        deployment.spec.environment = environment;
        self.store
            .replace_deployment(&deployment)
            .await
            .expect("deployment update should succeed");
    }

    /// Add labels to the deployment of `version`
    pub async fn label(&self, version: &str, labels: &[(&str, &str)]) {
        let mut deployment = self.deployment_for(version);
        let existing = deployment.metadata.labels.get_or_insert_with(BTreeMap::new);
        for (k, v) in labels {
            existing.insert((*k).to_string(), (*v).to_string());
        }
        self.store
            .replace_deployment(&deployment)
            .await
            .expect("deployment update should succeed");
    }
}

pub fn project(spec: PagesProjectSpec) -> PagesProject {
    let mut project = PagesProject::new(PROJECT, spec);
    project.metadata.namespace = Some(NAMESPACE.to_string());
    project
}

/// Declared version with an explicit archive source
pub fn version(name: &str) -> VersionSpec {
    VersionSpec {
        name: name.to_string(),
        source: Some(source(&format!("https://artifacts.example.com/{PROJECT}/{name}.tar.gz"))),
        metadata: BTreeMap::new(),
    }
}

pub fn source(url: &str) -> ArchiveSource {
    ArchiveSource {
        url: url.to_string(),
        checksum: None,
        credentials_ref: None,
    }
}

pub fn versions(names: &[&str]) -> Vec<VersionSpec> {
    names.iter().map(|n| version(n)).collect()
}

pub fn gitops(preview: Option<&str>, production: Option<&str>) -> GitOpsPolicy {
    GitOpsPolicy {
        preview_version: preview.map(str::to_string),
        production_version: production.map(str::to_string),
        require_preview_validation: true,
        validation_labels: BTreeMap::new(),
    }
}

/// A deployment already owned by the project, as a previous controller run left it
pub fn owned_deployment(
    version: &str,
    environment: Environment,
    created_on: &str,
    state: DeploymentState,
) -> PagesDeployment {
    let name = format!("{PROJECT}-{version}-seeded");
    PagesDeployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([
                (LABEL_MANAGED_BY_NAME.to_string(), PROJECT.to_string()),
                (LABEL_VERSION.to_string(), version.to_string()),
            ])),
            annotations: Some(BTreeMap::from([(
                ANNOTATION_CREATED_AT.to_string(),
                created_on.to_string(),
            )])),
            ..Default::default()
        },
        spec: PagesDeploymentSpec {
            project_ref: ProjectRef {
                name: Some(PROJECT.to_string()),
                external_name: Some(PROJECT.to_string()),
            },
            version_name: version.to_string(),
            environment,
            source: source(&format!("https://artifacts.example.com/{PROJECT}/{version}.tar.gz")),
            version_metadata: BTreeMap::new(),
        },
        status: Some(PagesDeploymentStatus {
            version_name: Some(version.to_string()),
            project_name: Some(PROJECT.to_string()),
            deployment_id: Some(format!("id-{version}")),
            state: Some(state),
            url: None,
            created_on: Some(created_on.to_string()),
            finished_on: Some(created_on.to_string()),
            conditions: Vec::new(),
        }),
    }
}

/// Reason of the `Ready` condition
pub fn ready_reason(status: &PagesProjectStatus) -> Option<String> {
    status
        .conditions
        .iter()
        .find(|c| c.r#type == "Ready")
        .and_then(|c| c.reason.clone())
}
