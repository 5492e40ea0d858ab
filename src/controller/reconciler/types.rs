//! # Types
//!
//! Core types for the reconciler: the shared context, the error taxonomy and
//! the per-resource backoff bookkeeping.

use crate::constants::{
    BACKEND_UNAVAILABLE_REQUEUE_SECS, NOT_FOUND_REQUEUE_SECS, VALIDATION_FAILED_REQUEUE_SECS,
};
use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::DeploymentState;
use crate::events::EventSink;
use crate::store::{ObjectStore, StoreError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Why a candidate deployment may not be promoted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionBlocked {
    /// The backend has not reported a successful build
    NotSucceeded {
        deployment: String,
        state: Option<DeploymentState>,
    },
    /// The backend has not assigned a deployment identifier
    MissingExternalId { deployment: String },
    /// No validation record and the version was never served as preview
    MissingValidation { version: String },
    /// The deployment lacks labels required by the validation gate
    MissingLabels {
        deployment: String,
        missing: Vec<String>,
    },
}

impl fmt::Display for PromotionBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionBlocked::NotSucceeded { deployment, state } => write!(
                f,
                "deployment {deployment} has not succeeded (state: {})",
                state.map_or("pending", |s| s.as_str())
            ),
            PromotionBlocked::MissingExternalId { deployment } => {
                write!(f, "deployment {deployment} has no backend deployment id yet")
            }
            PromotionBlocked::MissingValidation { version } => write!(
                f,
                "version {version} has no validation record and was not validated as preview"
            ),
            PromotionBlocked::MissingLabels {
                deployment,
                missing,
            } => write!(
                f,
                "deployment {deployment} is missing validation labels: {}",
                missing.join(", ")
            ),
        }
    }
}

/// A validation failure: either the spec is unusable or a promotion gate is closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    PromotionBlocked(PromotionBlocked),
    InvalidSpec(String),
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::PromotionBlocked(reason) => write!(f, "promotion blocked: {reason}"),
            ValidationFailure::InvalidSpec(message) => write!(f, "invalid spec: {message}"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcilerError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    ValidationFailed(ValidationFailure),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("{} operation(s) failed: {}", .0.len(), .0.join("; "))]
    PartialFailure(Vec<String>),
}

impl ReconcilerError {
    /// Delay before the next attempt after this error
    #[must_use]
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(match self {
            ReconcilerError::NotFound(_) => NOT_FOUND_REQUEUE_SECS,
            ReconcilerError::ValidationFailed(_) => VALIDATION_FAILED_REQUEUE_SECS,
            ReconcilerError::Conflict(_)
            | ReconcilerError::BackendUnavailable(_)
            | ReconcilerError::PartialFailure(_) => BACKEND_UNAVAILABLE_REQUEUE_SECS,
        })
    }

    /// Short label-safe category, used for metrics and condition reasons
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::NotFound(_) => "not_found",
            ReconcilerError::Conflict(_) => "conflict",
            ReconcilerError::ValidationFailed(ValidationFailure::PromotionBlocked(_)) => {
                "promotion_blocked"
            }
            ReconcilerError::ValidationFailed(ValidationFailure::InvalidSpec(_)) => "invalid_spec",
            ReconcilerError::BackendUnavailable(_) => "backend_unavailable",
            ReconcilerError::PartialFailure(_) => "partial_failure",
        }
    }

    /// Condition reason for `Ready=False`
    #[must_use]
    pub fn condition_reason(&self) -> &'static str {
        match self {
            ReconcilerError::NotFound(_) => "VersionNotFound",
            ReconcilerError::Conflict(_) => "Conflict",
            ReconcilerError::ValidationFailed(ValidationFailure::PromotionBlocked(_)) => {
                "PromotionBlocked"
            }
            ReconcilerError::ValidationFailed(ValidationFailure::InvalidSpec(_)) => "InvalidSpec",
            ReconcilerError::BackendUnavailable(_) => "BackendUnavailable",
            ReconcilerError::PartialFailure(_) => "PartialFailure",
        }
    }

    #[must_use]
    pub fn blocked(reason: PromotionBlocked) -> Self {
        ReconcilerError::ValidationFailed(ValidationFailure::PromotionBlocked(reason))
    }

    #[must_use]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        ReconcilerError::ValidationFailed(ValidationFailure::InvalidSpec(message.into()))
    }
}

impl From<StoreError> for ReconcilerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ReconcilerError::NotFound(err.to_string()),
            StoreError::AlreadyExists { .. } | StoreError::Conflict { .. } => {
                ReconcilerError::Conflict(err.to_string())
            }
            StoreError::Backend(message) => ReconcilerError::BackendUnavailable(message),
        }
    }
}

/// Trigger source for reconciliation
/// Tracks why a reconciliation was triggered for debugging and observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Manual trigger via CLI annotation (pagesctl reconcile)
    ManualCli,
    /// Watch event on the project or an owned deployment, or a timer requeue
    WatchEvent,
    /// Startup pass over existing projects
    Startup,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::ManualCli => "manual-cli",
            TriggerSource::WatchEvent => "watch-event",
            TriggerSource::Startup => "startup",
        }
    }
}

/// Backoff state for a specific resource
#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciler context shared by every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ObjectStore>,
    pub events: Arc<dyn EventSink>,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by namespace/name), owned by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        events: Arc<dyn EventSink>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            events,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the backoff state of a resource after a successful pass
    pub fn reset_backoff(&self, resource_key: &str) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(state) = states.get_mut(resource_key) {
            state.reset();
        }
    }
}
