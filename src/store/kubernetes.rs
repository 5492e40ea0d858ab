//! # Kubernetes Store
//!
//! [`ObjectStore`] backed by the Kubernetes API server through kube-rs.
//!
//! Optimistic concurrency comes from `metadata.resourceVersion`: a `replace`
//! carrying a stale token is rejected by the API server with HTTP 409.

use super::{ObjectStore, StoreError};
use crate::crd::{PagesDeployment, PagesProject};
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;

/// Kubernetes-backed object store
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn projects(&self, namespace: &str) -> Api<PagesProject> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn deployments(&self, namespace: &str) -> Api<PagesDeployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// How an HTTP 409 should be read for a given call
#[derive(Clone, Copy)]
enum On409 {
    AlreadyExists,
    Conflict,
}

fn map_error(
    err: kube::Error,
    kind: &'static str,
    namespace: &str,
    name: &str,
    on_409: On409,
) -> StoreError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(api_err) if api_err.code == 409 => match on_409 {
            On409::AlreadyExists => StoreError::AlreadyExists {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            On409::Conflict => StoreError::Conflict {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
        },
        other => StoreError::Backend(other.to_string()),
    }
}

fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn object_ref(meta: &kube::api::ObjectMeta) -> (String, String) {
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_project(&self, namespace: &str, name: &str) -> Result<PagesProject, StoreError> {
        self.projects(namespace)
            .get(name)
            .await
            .map_err(|e| map_error(e, "PagesProject", namespace, name, On409::Conflict))
    }

    async fn replace_project(&self, project: &PagesProject) -> Result<PagesProject, StoreError> {
        let (namespace, name) = object_ref(&project.metadata);
        self.projects(&namespace)
            .replace(&name, &PostParams::default(), project)
            .await
            .map_err(|e| map_error(e, "PagesProject", &namespace, &name, On409::Conflict))
    }

    async fn replace_project_status(
        &self,
        project: &PagesProject,
    ) -> Result<PagesProject, StoreError> {
        let (namespace, name) = object_ref(&project.metadata);
        let body = serde_json::to_vec(project)
            .map_err(|e| StoreError::Backend(format!("failed to serialize status: {e}")))?;
        self.projects(&namespace)
            .replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(|e| map_error(e, "PagesProject", &namespace, &name, On409::Conflict))
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PagesDeployment, StoreError> {
        self.deployments(namespace)
            .get(name)
            .await
            .map_err(|e| map_error(e, "PagesDeployment", namespace, name, On409::Conflict))
    }

    async fn list_deployments(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PagesDeployment>, StoreError> {
        let mut params = ListParams::default();
        if !labels.is_empty() {
            params = params.labels(&label_selector(labels));
        }
        self.deployments(namespace)
            .list(&params)
            .await
            .map(|list| list.items)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn create_deployment(
        &self,
        deployment: &PagesDeployment,
    ) -> Result<PagesDeployment, StoreError> {
        let (namespace, name) = object_ref(&deployment.metadata);
        self.deployments(&namespace)
            .create(&PostParams::default(), deployment)
            .await
            .map_err(|e| {
                map_error(
                    e,
                    "PagesDeployment",
                    &namespace,
                    &name,
                    On409::AlreadyExists,
                )
            })
    }

    async fn replace_deployment(
        &self,
        deployment: &PagesDeployment,
    ) -> Result<PagesDeployment, StoreError> {
        let (namespace, name) = object_ref(&deployment.metadata);
        self.deployments(&namespace)
            .replace(&name, &PostParams::default(), deployment)
            .await
            .map_err(|e| map_error(e, "PagesDeployment", &namespace, &name, On409::Conflict))
    }

    async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.deployments(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| map_error(e, "PagesDeployment", namespace, name, On409::Conflict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector_joins_sorted_pairs() {
        let labels = BTreeMap::from([
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]);
        assert_eq!(label_selector(&labels), "a=1,b=2");
        assert_eq!(label_selector(&BTreeMap::new()), "");
    }
}
