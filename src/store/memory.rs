//! # In-Memory Store
//!
//! An [`ObjectStore`] held entirely in process memory.
//!
//! Mirrors the API server semantics the reconciler depends on: resource version
//! tokens with conflict detection on replace, `AlreadyExists` on create and
//! label-filtered listing. Fault injection hooks let tests force conflicts,
//! individual delete failures and a full backend outage.

use super::{ObjectStore, StoreError};
use crate::crd::{PagesDeployment, PagesDeploymentStatus, PagesProject};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

type Key = (String, String);

/// Count of successful writes, by kind of write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationCounts {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub project_updates: usize,
    pub status_updates: usize,
}

impl MutationCounts {
    /// Writes against deployment objects
    #[must_use]
    pub fn deployment_writes(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

#[derive(Debug, Default)]
struct Inner {
    projects: BTreeMap<Key, PagesProject>,
    deployments: BTreeMap<Key, PagesDeployment>,
    next_version: u64,
    counts: MutationCounts,
    conflicts_remaining: u32,
    failing_deletes: BTreeSet<String>,
    unavailable: Option<String>,
}

impl Inner {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        match &self.unavailable {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }

    fn take_injected_conflict(&mut self) -> bool {
        if self.conflicts_remaining > 0 {
            self.conflicts_remaining -= 1;
            true
        } else {
            false
        }
    }
}

/// In-process object store
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a project, assigning uid and resource version when missing
    pub fn insert_project(&self, mut project: PagesProject) {
        let mut inner = self.lock();
        let key = key_of(&project.metadata);
        if project.metadata.uid.is_none() {
            project.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        project.metadata.resource_version = Some(inner.bump());
        project.metadata.generation.get_or_insert(1);
        inner.projects.insert(key, project);
    }

    /// Seed a deployment as-is (status included), bypassing mutation counters
    pub fn insert_deployment(&self, mut deployment: PagesDeployment) {
        let mut inner = self.lock();
        let key = key_of(&deployment.metadata);
        if deployment.metadata.uid.is_none() {
            deployment.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        deployment.metadata.resource_version = Some(inner.bump());
        inner.deployments.insert(key, deployment);
    }

    /// Write a deployment's status the way the downstream backend controller would
    pub fn set_deployment_status(
        &self,
        namespace: &str,
        name: &str,
        status: PagesDeploymentStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let version = inner.bump();
        let deployment = inner
            .deployments
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| not_found("PagesDeployment", namespace, name))?;
        deployment.status = Some(status);
        deployment.metadata.resource_version = Some(version);
        Ok(())
    }

    /// Fail the next `count` replace calls with `Conflict`
    pub fn inject_conflicts(&self, count: u32) {
        self.lock().conflicts_remaining = count;
    }

    /// Fail every delete of the named deployment with a backend error
    pub fn fail_deletes_for(&self, name: &str) {
        self.lock().failing_deletes.insert(name.to_string());
    }

    /// Fail every call with a backend error until cleared with `None`
    pub fn set_unavailable(&self, message: Option<&str>) {
        self.lock().unavailable = message.map(str::to_string);
    }

    #[must_use]
    pub fn mutation_counts(&self) -> MutationCounts {
        self.lock().counts
    }

    /// Snapshot of every deployment in a namespace, ordered by name
    #[must_use]
    pub fn deployments(&self, namespace: &str) -> Vec<PagesDeployment> {
        self.lock()
            .deployments
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, d)| d.clone())
            .collect()
    }
}

fn key_of(meta: &kube::api::ObjectMeta) -> Key {
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn conflict(kind: &'static str, key: &Key) -> StoreError {
    StoreError::Conflict {
        kind,
        namespace: key.0.clone(),
        name: key.1.clone(),
    }
}

fn stale(expected: Option<&String>, stored: Option<&String>) -> bool {
    matches!(expected, Some(token) if Some(token) != stored)
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_project(&self, namespace: &str, name: &str) -> Result<PagesProject, StoreError> {
        let inner = self.lock();
        inner.check_available()?;
        inner
            .projects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("PagesProject", namespace, name))
    }

    async fn replace_project(&self, project: &PagesProject) -> Result<PagesProject, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        let key = key_of(&project.metadata);
        if inner.take_injected_conflict() {
            return Err(conflict("PagesProject", &key));
        }
        let version = inner.bump();
        let stored = inner
            .projects
            .get_mut(&key)
            .ok_or_else(|| not_found("PagesProject", &key.0, &key.1))?;
        if stale(
            project.metadata.resource_version.as_ref(),
            stored.metadata.resource_version.as_ref(),
        ) {
            return Err(conflict("PagesProject", &key));
        }
        let status = stored.status.take();
        let generation = stored.metadata.generation.unwrap_or(1);
        let spec_changed = serde_json::to_value(&stored.spec).ok()
            != serde_json::to_value(&project.spec).ok();
        *stored = project.clone();
        stored.status = status;
        stored.metadata.generation = Some(if spec_changed {
            generation + 1
        } else {
            generation
        });
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        inner.counts.project_updates += 1;
        Ok(updated)
    }

    async fn replace_project_status(
        &self,
        project: &PagesProject,
    ) -> Result<PagesProject, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        let key = key_of(&project.metadata);
        if inner.take_injected_conflict() {
            return Err(conflict("PagesProject", &key));
        }
        let version = inner.bump();
        let stored = inner
            .projects
            .get_mut(&key)
            .ok_or_else(|| not_found("PagesProject", &key.0, &key.1))?;
        if stale(
            project.metadata.resource_version.as_ref(),
            stored.metadata.resource_version.as_ref(),
        ) {
            return Err(conflict("PagesProject", &key));
        }
        stored.status.clone_from(&project.status);
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        inner.counts.status_updates += 1;
        Ok(updated)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PagesDeployment, StoreError> {
        let inner = self.lock();
        inner.check_available()?;
        inner
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| not_found("PagesDeployment", namespace, name))
    }

    async fn list_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PagesDeployment>, StoreError> {
        let inner = self.lock();
        inner.check_available()?;
        Ok(inner
            .deployments
            .iter()
            .filter(|((ns, _), d)| ns == namespace && d.labels_match(labels))
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn create_deployment(
        &self,
        deployment: &PagesDeployment,
    ) -> Result<PagesDeployment, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        let key = key_of(&deployment.metadata);
        if inner.deployments.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: "PagesDeployment",
                namespace: key.0,
                name: key.1,
            });
        }
        let mut created = deployment.clone();
        created.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        created.metadata.resource_version = Some(inner.bump());
        created.metadata.generation = Some(1);
        inner.deployments.insert(key, created.clone());
        inner.counts.creates += 1;
        Ok(created)
    }

    async fn replace_deployment(
        &self,
        deployment: &PagesDeployment,
    ) -> Result<PagesDeployment, StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        let key = key_of(&deployment.metadata);
        if inner.take_injected_conflict() {
            return Err(conflict("PagesDeployment", &key));
        }
        let version = inner.bump();
        let stored = inner
            .deployments
            .get_mut(&key)
            .ok_or_else(|| not_found("PagesDeployment", &key.0, &key.1))?;
        if stale(
            deployment.metadata.resource_version.as_ref(),
            stored.metadata.resource_version.as_ref(),
        ) {
            return Err(conflict("PagesDeployment", &key));
        }
        let status = stored.status.take();
        *stored = deployment.clone();
        stored.status = status;
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        inner.counts.updates += 1;
        Ok(updated)
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_available()?;
        if inner.failing_deletes.contains(name) {
            return Err(StoreError::Backend(format!(
                "injected delete failure for {namespace}/{name}"
            )));
        }
        inner
            .deployments
            .remove(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| not_found("PagesDeployment", namespace, name))?;
        inner.counts.deletes += 1;
        Ok(())
    }
}
