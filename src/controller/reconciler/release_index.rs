//! # Release Index
//!
//! A derived, non-persistent view over the deployments a project owns.
//! Rebuilt from a fresh listing whenever a stage needs current state, so it
//! never outlives the writes of the stage before it.

use crate::constants::LABEL_MANAGED_BY_NAME;
use crate::controller::reconciler::context::ProjectIdentity;
use crate::crd::PagesDeployment;
use crate::store::{ObjectStore, StoreError};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Whether `deployment` belongs to the project identified by `identity`
///
/// Any one of four signals is enough, so partially migrated objects where some
/// of the fields are unset are still recognized.
#[must_use]
pub fn belongs_to(deployment: &PagesDeployment, identity: &ProjectIdentity) -> bool {
    let project_ref = &deployment.spec.project_ref;
    let by_ref_name = project_ref.name.as_deref() == Some(identity.name.as_str());
    let by_ref_external = !identity.external_name.is_empty()
        && project_ref.external_name.as_deref() == Some(identity.external_name.as_str());
    let by_status = !identity.external_name.is_empty()
        && deployment
            .status
            .as_ref()
            .and_then(|s| s.project_name.as_deref())
            == Some(identity.external_name.as_str());
    let by_label = deployment
        .metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(LABEL_MANAGED_BY_NAME))
        .map(String::as_str)
        == Some(identity.name.as_str());
    by_ref_name || by_ref_external || by_status || by_label
}

/// Newest first by creation time; deployments without a creation time sort last
pub(crate) fn by_created_desc(a: &PagesDeployment, b: &PagesDeployment) -> Ordering {
    match (a.created_at(), b.created_at()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Lookup over the deployments owned by one project
#[derive(Debug, Clone, Default)]
pub struct ReleaseIndex {
    deployments: Vec<PagesDeployment>,
}

impl ReleaseIndex {
    /// Build the index from an arbitrary deployment listing, keeping only owned ones
    #[must_use]
    pub fn build(identity: &ProjectIdentity, listing: Vec<PagesDeployment>) -> Self {
        let mut deployments: Vec<_> = listing
            .into_iter()
            .filter(|d| belongs_to(d, identity))
            .collect();
        deployments.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        Self { deployments }
    }

    /// List the project's namespace and build the index
    pub async fn load(
        store: &dyn ObjectStore,
        identity: &ProjectIdentity,
    ) -> Result<Self, StoreError> {
        let listing = store
            .list_deployments(&identity.namespace, &BTreeMap::new())
            .await?;
        Ok(Self::build(identity, listing))
    }

    #[must_use]
    pub fn deployments(&self) -> &[PagesDeployment] {
        &self.deployments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deployments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
    }

    /// The deployment standing for a version
    ///
    /// While a recreate is in flight two objects can share a version name; the
    /// production one wins, then the newest.
    #[must_use]
    pub fn for_version(&self, version: &str) -> Option<&PagesDeployment> {
        let mut candidates: Vec<&PagesDeployment> = self
            .deployments
            .iter()
            .filter(|d| d.version_name() == Some(version))
            .collect();
        candidates.sort_by(|a, b| {
            b.is_production()
                .cmp(&a.is_production())
                .then_with(|| by_created_desc(a, b))
        });
        candidates.into_iter().next()
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&PagesDeployment> {
        self.deployments
            .iter()
            .find(|d| d.metadata.name.as_deref() == Some(name))
    }

    /// Deployments currently declared as production
    pub fn production(&self) -> impl Iterator<Item = &PagesDeployment> {
        self.deployments.iter().filter(|d| d.is_production())
    }

    /// Deployments matching an equality label selector
    pub fn matching<'a>(
        &'a self,
        selector: &'a BTreeMap<String, String>,
    ) -> impl Iterator<Item = &'a PagesDeployment> + 'a {
        self.deployments
            .iter()
            .filter(move |d| d.labels_match(selector))
    }
}
