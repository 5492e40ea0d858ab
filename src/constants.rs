//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group shared by both custom resources
pub const API_GROUP: &str = "pages.octopilot.io";

/// Field manager / event reporter name
pub const CONTROLLER_NAME: &str = "pages-release-controller";

/// Label carrying the active policy tag of the owning project
pub const LABEL_MANAGED_BY: &str = "pages.octopilot.io/managed-by";

/// Label carrying the owning project's resource name
pub const LABEL_MANAGED_BY_NAME: &str = "pages.octopilot.io/managed-by-name";

/// Label carrying the owning project's uid
/// Guards against stale labels surviving owner recreation
pub const LABEL_MANAGED_BY_UID: &str = "pages.octopilot.io/managed-by-uid";

/// Label carrying the deployment's version name
pub const LABEL_VERSION: &str = "pages.octopilot.io/version";

/// Annotation stamped with the RFC3339 creation time when a deployment object is created
pub const ANNOTATION_CREATED_AT: &str = "pages.octopilot.io/created-at";

/// Annotation set by `pagesctl reconcile` to force a reconciliation
pub const ANNOTATION_MANUAL_RECONCILE: &str = "pages.octopilot.io/reconcile";

/// Finalizer guarding owned-deployment cleanup on project deletion
pub const PROJECT_FINALIZER: &str = "pages.octopilot.io/cleanup";

/// Sentinel production target meaning "first declared version"
pub const PRODUCTION_TARGET_LATEST: &str = "latest";

/// Default number of deployments retained per project
pub const DEFAULT_REVISION_HISTORY_LIMIT: usize = 10;

/// Maximum number of validation records kept in project status
pub const MAX_VALIDATION_HISTORY: usize = 50;

/// Default read-modify-write attempts before a conflict is surfaced
pub const DEFAULT_CONFLICT_RETRY_ATTEMPTS: u32 = 5;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval for reconciliation errors (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Requeue after a missing version or deployment (seconds)
pub const NOT_FOUND_REQUEUE_SECS: u64 = 10;

/// Requeue after a failed promotion gate (seconds)
pub const VALIDATION_FAILED_REQUEUE_SECS: u64 = 15;

/// Requeue after a store/backend failure (seconds)
pub const BACKEND_UNAVAILABLE_REQUEUE_SECS: u64 = 30;

/// Requeue while a selected deployment is still building (seconds)
pub const BUILD_IN_PROGRESS_REQUEUE_SECS: u64 = 20;

/// Steady-state resync interval for converged projects (seconds)
pub const DEFAULT_RESYNC_SECS: u64 = 300;

/// Default sync interval for the external policy
pub const DEFAULT_EXTERNAL_SYNC_INTERVAL: &str = "5m";

/// Minimum sync interval accepted for the external policy (seconds)
pub const MIN_EXTERNAL_SYNC_INTERVAL_SECS: u64 = 30;

/// Default exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;
