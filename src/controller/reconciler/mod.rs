//! # Reconciler
//!
//! Core reconciliation logic for `PagesProject` resources.
//!
//! The reconciler:
//! - Watches `PagesProject` resources and the `PagesDeployment` objects they own
//! - Converges the declared versions to one deployment per version
//! - Runs the project's version management policy and promotes its choice
//! - Prunes deployments beyond the retention limit, never production
//! - Updates project status with the managed release set
//!
//! ## Module Structure
//!
//! - `context`: Per-pass borrowed collaborators and the project identity
//! - `history`: Bounded validation history ring buffer
//! - `policy`: Version management policy engines
//! - `promotion`: Promote/demote protocol
//! - `pruner`: Retention-limit garbage collection
//! - `reconcile`: Entry point, finalization and deletion cleanup
//! - `release_index`: Ownership matching and version lookups
//! - `release_set`: Desired versions to deployment objects
//! - `sources`: Source template rendering and deployment naming
//! - `status`: Status aggregation and persistence
//! - `types`: Error taxonomy and shared reconciler state
//! - `validation`: Spec validation

pub mod context;
pub mod history;
pub mod policy;
pub mod promotion;
pub mod pruner;
pub mod reconcile;
pub mod release_index;
pub mod release_set;
pub mod sources;
pub mod status;
pub mod types;
pub mod validation;

// Re-export public API
pub use reconcile::{cleanup_project, reconcile};
pub use types::{
    BackoffState, PromotionBlocked, Reconciler, ReconcilerError, TriggerSource, ValidationFailure,
};
