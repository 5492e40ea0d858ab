//! # Annotation Management
//!
//! Handles the manual reconcile trigger annotation set by `pagesctl reconcile`.

use crate::constants::ANNOTATION_MANUAL_RECONCILE;
use crate::crd::PagesProject;
use crate::store::{update_project_with_retry, ObjectStore, StoreError};

/// Whether the project carries the manual trigger annotation
#[must_use]
pub fn is_manual_trigger(project: &PagesProject) -> bool {
    project
        .metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(ANNOTATION_MANUAL_RECONCILE))
}

/// Clear the manual trigger annotation after a pass
/// This prevents repeated manual reconciliations
pub async fn clear_manual_trigger_annotation(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    attempts: u32,
) -> Result<(), StoreError> {
    update_project_with_retry(store, namespace, name, attempts, |project| {
        project
            .metadata
            .annotations
            .as_mut()
            .and_then(|a| a.remove(ANNOTATION_MANUAL_RECONCILE))
            .is_some()
    })
    .await?;
    Ok(())
}
