//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use pages_release_controller::prelude::*;
//! ```

// CRD types - most commonly used
pub use crate::crd::*;

// Store and event seams
pub use crate::events::{EventReason, EventSink, KubeEventSink, RecordingEvents};
pub use crate::store::{KubeStore, MemoryStore, ObjectStore, StoreError};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    cleanup_project, reconcile, BackoffState, PromotionBlocked, Reconciler, ReconcilerError,
    TriggerSource, ValidationFailure,
};

// Config types - for configuration management
pub use crate::config::{
    ControllerConfig, ServerConfig, SharedControllerConfig, SharedServerConfig,
};
