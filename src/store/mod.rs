//! # Object Store
//!
//! The declarative object store the controller reconciles against.
//!
//! Every component receives the store as an injected `Arc<dyn ObjectStore>`;
//! nothing reaches the API server through package-level state. Objects carry an
//! opaque version token (`metadata.resourceVersion`) and `replace_*` calls fail
//! with [`StoreError::Conflict`] when the token is stale.
//!
//! - `kubernetes`: Kubernetes API server implementation
//! - `memory`: In-process implementation with fault injection, used by tests

pub mod kubernetes;
pub mod memory;

pub use self::kubernetes::KubeStore;
pub use self::memory::{MemoryStore, MutationCounts};

use crate::crd::{PagesDeployment, PagesProject};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors returned by object store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("object store request failed: {0}")]
    Backend(String),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Object store seam
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a project
    async fn get_project(&self, namespace: &str, name: &str) -> Result<PagesProject, StoreError>;

    /// Replace a project's metadata and spec (used for finalizers and annotations)
    /// Fails with `Conflict` when `metadata.resourceVersion` is stale
    async fn replace_project(&self, project: &PagesProject) -> Result<PagesProject, StoreError>;

    /// Replace a project's status subresource
    /// Fails with `Conflict` when `metadata.resourceVersion` is stale
    async fn replace_project_status(
        &self,
        project: &PagesProject,
    ) -> Result<PagesProject, StoreError>;

    /// Fetch a deployment
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PagesDeployment, StoreError>;

    /// List deployments in a namespace matching every label in `labels`
    async fn list_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PagesDeployment>, StoreError>;

    /// Create a deployment; fails with `AlreadyExists` if the name is taken
    async fn create_deployment(
        &self,
        deployment: &PagesDeployment,
    ) -> Result<PagesDeployment, StoreError>;

    /// Replace a deployment
    /// Fails with `Conflict` when `metadata.resourceVersion` is stale
    async fn replace_deployment(
        &self,
        deployment: &PagesDeployment,
    ) -> Result<PagesDeployment, StoreError>;

    /// Delete a deployment
    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// Read-modify-write a deployment, retrying on conflict
///
/// `mutate` is reapplied to a freshly fetched object on every attempt and
/// returns `false` when no change is needed, in which case nothing is written
/// and `Ok(None)` is returned. After `attempts` conflicts the last conflict is
/// surfaced.
pub async fn update_deployment_with_retry<F>(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    attempts: u32,
    mut mutate: F,
) -> Result<Option<PagesDeployment>, StoreError>
where
    F: FnMut(&mut PagesDeployment) -> bool + Send,
{
    let attempts = attempts.max(1);
    let mut last_conflict = None;
    for attempt in 1..=attempts {
        let mut current = store.get_deployment(namespace, name).await?;
        if !mutate(&mut current) {
            return Ok(None);
        }
        match store.replace_deployment(&current).await {
            Ok(updated) => return Ok(Some(updated)),
            Err(e) if e.is_conflict() => {
                debug!(
                    "Conflict updating PagesDeployment {}/{} (attempt {}/{}), retrying",
                    namespace, name, attempt, attempts
                );
                last_conflict = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_conflict.unwrap_or_else(|| StoreError::Conflict {
        kind: "PagesDeployment",
        namespace: namespace.to_string(),
        name: name.to_string(),
    }))
}

/// Read-modify-write a project's status, retrying on conflict
///
/// Same contract as [`update_deployment_with_retry`].
pub async fn update_project_status_with_retry<F>(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    attempts: u32,
    mut mutate: F,
) -> Result<Option<PagesProject>, StoreError>
where
    F: FnMut(&mut PagesProject) -> bool + Send,
{
    let attempts = attempts.max(1);
    let mut last_conflict = None;
    for attempt in 1..=attempts {
        let mut current = store.get_project(namespace, name).await?;
        if !mutate(&mut current) {
            return Ok(None);
        }
        match store.replace_project_status(&current).await {
            Ok(updated) => return Ok(Some(updated)),
            Err(e) if e.is_conflict() => {
                debug!(
                    "Conflict updating PagesProject {}/{} status (attempt {}/{}), retrying",
                    namespace, name, attempt, attempts
                );
                last_conflict = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_conflict.unwrap_or_else(|| StoreError::Conflict {
        kind: "PagesProject",
        namespace: namespace.to_string(),
        name: name.to_string(),
    }))
}

/// Read-modify-write a project's metadata/spec, retrying on conflict
pub async fn update_project_with_retry<F>(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    attempts: u32,
    mut mutate: F,
) -> Result<Option<PagesProject>, StoreError>
where
    F: FnMut(&mut PagesProject) -> bool + Send,
{
    let attempts = attempts.max(1);
    let mut last_conflict = None;
    for _ in 0..attempts {
        let mut current = store.get_project(namespace, name).await?;
        if !mutate(&mut current) {
            return Ok(None);
        }
        match store.replace_project(&current).await {
            Ok(updated) => return Ok(Some(updated)),
            Err(e) if e.is_conflict() => last_conflict = Some(e),
            Err(e) => return Err(e),
        }
    }
    Err(last_conflict.unwrap_or_else(|| StoreError::Conflict {
        kind: "PagesProject",
        namespace: namespace.to_string(),
        name: name.to_string(),
    }))
}

/// Add `finalizer` to a project if it is not already present
pub async fn add_project_finalizer(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    finalizer: &str,
    attempts: u32,
) -> Result<Option<PagesProject>, StoreError> {
    update_project_with_retry(store, namespace, name, attempts, |project| {
        let finalizers = project.metadata.finalizers.get_or_insert_with(Vec::new);
        if finalizers.iter().any(|f| f == finalizer) {
            return false;
        }
        finalizers.push(finalizer.to_string());
        true
    })
    .await
}

/// Remove `finalizer` from a project; a missing project is not an error
pub async fn remove_project_finalizer(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    finalizer: &str,
    attempts: u32,
) -> Result<(), StoreError> {
    let result = update_project_with_retry(store, namespace, name, attempts, |project| {
        let Some(finalizers) = project.metadata.finalizers.as_mut() else {
            return false;
        };
        let before = finalizers.len();
        finalizers.retain(|f| f != finalizer);
        finalizers.len() != before
    })
    .await;
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        ArchiveSource, Environment, PagesDeploymentSpec, PagesProjectSpec, ProjectRef,
        VersionManagement,
    };

    fn deployment(name: &str) -> PagesDeployment {
        let mut d = PagesDeployment::new(
            name,
            PagesDeploymentSpec {
                project_ref: ProjectRef::default(),
                version_name: "v1".to_string(),
                environment: Environment::Preview,
                source: ArchiveSource::default(),
                version_metadata: BTreeMap::new(),
            },
        );
        d.metadata.namespace = Some("web".to_string());
        d
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_conflicts() {
        let store = MemoryStore::new();
        store.create_deployment(&deployment("docs-v1")).await.unwrap();
        store.inject_conflicts(2);

        let updated = update_deployment_with_retry(&store, "web", "docs-v1", 5, |d| {
            d.spec.environment = Environment::Production;
            true
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.spec.environment, Environment::Production);
    }

    #[tokio::test]
    async fn test_retry_surfaces_conflict_after_exhaustion() {
        let store = MemoryStore::new();
        store.create_deployment(&deployment("docs-v1")).await.unwrap();
        store.inject_conflicts(10);

        let err = update_deployment_with_retry(&store, "web", "docs-v1", 3, |d| {
            d.spec.environment = Environment::Production;
            true
        })
        .await
        .unwrap_err();

        assert!(err.is_conflict());
        let stored = store.get_deployment("web", "docs-v1").await.unwrap();
        assert_eq!(stored.spec.environment, Environment::Preview);
    }

    #[tokio::test]
    async fn test_retry_skips_write_when_unchanged() {
        let store = MemoryStore::new();
        store.create_deployment(&deployment("docs-v1")).await.unwrap();
        let before = store.mutation_counts();

        let result = update_deployment_with_retry(&store, "web", "docs-v1", 5, |_| false)
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(store.mutation_counts(), before);
    }

    #[tokio::test]
    async fn test_finalizer_add_is_idempotent_and_remove_clears_it() {
        let store = MemoryStore::new();
        let mut project = PagesProject::new(
            "docs",
            PagesProjectSpec {
                project_name: None,
                versions: Vec::new(),
                source_template: None,
                production_target: None,
                revision_history_limit: None,
                version_management: VersionManagement::Declarative,
                suspend: false,
            },
        );
        project.metadata.namespace = Some("web".to_string());
        store.insert_project(project);

        add_project_finalizer(&store, "web", "docs", "example/cleanup", 5)
            .await
            .unwrap();
        let second = add_project_finalizer(&store, "web", "docs", "example/cleanup", 5)
            .await
            .unwrap();
        assert!(second.is_none());

        let stored = store.get_project("web", "docs").await.unwrap();
        assert_eq!(
            stored.metadata.finalizers,
            Some(vec!["example/cleanup".to_string()])
        );

        remove_project_finalizer(&store, "web", "docs", "example/cleanup", 5)
            .await
            .unwrap();
        let stored = store.get_project("web", "docs").await.unwrap();
        assert_eq!(stored.metadata.finalizers, Some(Vec::new()));

        remove_project_finalizer(&store, "web", "gone", "example/cleanup", 5)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_retry_propagates_not_found() {
        let store = MemoryStore::new();
        let err = update_deployment_with_retry(&store, "web", "missing", 5, |_| true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
