//! # Pass Context
//!
//! Everything one reconciliation pass needs, borrowed from the shared
//! [`Reconciler`](super::Reconciler) and the project being reconciled.

use crate::constants::{LABEL_MANAGED_BY, LABEL_MANAGED_BY_NAME, LABEL_MANAGED_BY_UID};
use crate::crd::{PagesProject, PolicyKind};
use crate::events::{EventReason, EventSink};
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::Resource;
use std::collections::BTreeMap;

/// Stable identity of the project owning a set of deployments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
    pub external_name: String,
    pub policy: PolicyKind,
}

impl ProjectIdentity {
    #[must_use]
    pub fn from_project(project: &PagesProject) -> Self {
        Self {
            name: project.metadata.name.clone().unwrap_or_default(),
            namespace: project
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            uid: project.metadata.uid.clone(),
            external_name: project.external_name().to_string(),
            policy: project.spec.version_management.kind(),
        }
    }

    /// The managed-by label triad stamped on every deployment this project creates
    #[must_use]
    pub fn managed_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::from([
            (
                LABEL_MANAGED_BY.to_string(),
                self.policy.as_str().to_string(),
            ),
            (LABEL_MANAGED_BY_NAME.to_string(), self.name.clone()),
        ]);
        if let Some(uid) = &self.uid {
            labels.insert(LABEL_MANAGED_BY_UID.to_string(), uid.clone());
        }
        labels
    }

    /// `namespace/name`, the key used for backoff state and logging
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Borrowed collaborators and settings for one pass over one project
pub struct PassContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub events: &'a dyn EventSink,
    pub project: &'a PagesProject,
    pub identity: ProjectIdentity,
    pub conflict_attempts: u32,
}

impl<'a> PassContext<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn ObjectStore,
        events: &'a dyn EventSink,
        project: &'a PagesProject,
        conflict_attempts: u32,
    ) -> Self {
        Self {
            store,
            events,
            project,
            identity: ProjectIdentity::from_project(project),
            conflict_attempts,
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.identity.namespace
    }

    /// Publish an event regarding the project
    pub async fn project_event(&self, reason: EventReason, note: String) {
        let reference = self.project.object_ref(&());
        self.events.publish(&reference, reason, note).await;
    }

    /// Publish an event regarding another object
    pub async fn event_for(&self, reference: &ObjectReference, reason: EventReason, note: String) {
        self.events.publish(reference, reason, note).await;
    }
}

impl std::fmt::Debug for PassContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassContext")
            .field("identity", &self.identity)
            .field("conflict_attempts", &self.conflict_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PagesProjectSpec, VersionManagement};

    #[test]
    fn test_managed_labels_include_uid_when_known() {
        let mut project = PagesProject::new(
            "docs",
            PagesProjectSpec {
                project_name: Some("docs-site".to_string()),
                versions: Vec::new(),
                source_template: None,
                production_target: None,
                revision_history_limit: None,
                version_management: VersionManagement::Declarative,
                suspend: false,
            },
        );
        project.metadata.namespace = Some("web".to_string());

        let identity = ProjectIdentity::from_project(&project);
        assert_eq!(identity.external_name, "docs-site");
        assert_eq!(identity.managed_labels().len(), 2);
        assert_eq!(identity.key(), "web/docs");

        project.metadata.uid = Some("uid-1".to_string());
        let labels = ProjectIdentity::from_project(&project).managed_labels();
        assert_eq!(labels.get(LABEL_MANAGED_BY_UID).map(String::as_str), Some("uid-1"));
        assert_eq!(labels.get(LABEL_MANAGED_BY).map(String::as_str), Some("declarative"));
    }
}
