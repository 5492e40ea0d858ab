//! # Custom Resource Definitions
//!
//! CRD types for the Pages Release Controller.
//!
//! ## Module Structure
//!
//! - `project.rs` - `PagesProject`: the release manifest and its policy selection
//! - `deployment.rs` - `PagesDeployment`: one immutable build artifact on the hosting backend
//! - `policy.rs` - Version management policies (tagged union)
//! - `source.rs` - Build source descriptors and declared versions
//! - `status.rs` - Status types for tracking reconciliation state

mod deployment;
mod policy;
mod project;
mod source;
mod status;

// Re-export all public types
pub use deployment::{
    DeploymentState, Environment, PagesDeployment, PagesDeploymentSpec, PagesDeploymentStatus,
    ProjectRef,
};
pub use policy::{
    AutoPromotePolicy, ExternalPolicy, GitOpsPolicy, LatestPreviewPolicy, PolicyKind,
    VersionManagement,
};
pub use project::{default_false, default_true, PagesProject, PagesProjectSpec};
pub use source::{ArchiveSource, CredentialsRef, VersionSpec};
pub use status::{
    Condition, PagesProjectStatus, ProductionInfo, ValidationOutcome, ValidationRecord,
    VersionSummary,
};
