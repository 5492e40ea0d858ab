//! # Status Management
//!
//! Computes and persists `PagesProject` status.
//!
//! Writes only happen when the computed status differs from the stored one
//! (ignoring `lastReconcileTime`), so a converged project does not generate
//! watch events on every resync.

mod aggregate;
mod annotations;
mod phase;

pub use aggregate::{
    compute_status, current_production, status_differs, suspended_status, StatusInputs,
};
pub use annotations::{clear_manual_trigger_annotation, is_manual_trigger};
pub use phase::{
    ready_condition, CONDITION_READY, PHASE_DEGRADED, PHASE_READY, PHASE_SUSPENDED,
};

use crate::crd::PagesProjectStatus;
use crate::store::{update_project_status_with_retry, ObjectStore, StoreError};
use tracing::debug;

/// Persist `desired` as the project's status if it differs from what is stored
/// Returns whether a write happened
pub async fn write_status(
    store: &dyn ObjectStore,
    namespace: &str,
    name: &str,
    desired: &PagesProjectStatus,
    attempts: u32,
) -> Result<bool, StoreError> {
    let written = update_project_status_with_retry(store, namespace, name, attempts, |project| {
        if !status_differs(project.status.as_ref(), desired) {
            return false;
        }
        project.status = Some(desired.clone());
        true
    })
    .await?;
    if written.is_none() {
        debug!(
            "Skipping status update for {}/{} - status unchanged",
            namespace, name
        );
    }
    Ok(written.is_some())
}
