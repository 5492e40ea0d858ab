//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::PagesProject;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per project so one failing project does not slow
/// down the others. A successful pass resets it (see `finalize_reconciliation`).
pub fn handle_reconciliation_error(
    obj: Arc<PagesProject>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {:?}", namespace, name, error);
    observability::metrics::increment_reconciliation_errors(error.kind());

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = next_backoff(&ctx, &resource_key);

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));

    info!(
        "Retrying {} with Fibonacci backoff: {}s (error count: {}, next attempt: {})",
        resource_key,
        backoff_seconds,
        error_count,
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Advance the backoff of one resource; returns (delay seconds, error count)
fn next_backoff(ctx: &Reconciler, resource_key: &str) -> (u64, u32) {
    match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(resource_key.to_string())
                .or_insert_with(BackoffState::new);
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!(
                "Failed to lock backoff_states: {}, using default backoff",
                e
            );
            (ctx.config.reconciliation_error_requeue_secs, 0)
        }
    }
}

/// Classification of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    Expired,
    TooManyRequests,
    NotFound,
    Other,
}

impl WatchErrorKind {
    /// Classify by the rendered error; 404 is checked before 401 because a
    /// plain-text 404 body surfaces as a `WatchFailed` deserialization error
    #[must_use]
    pub fn classify(error_string: &str) -> Self {
        let is_not_found = error_string.contains("ObjectNotFound")
            || error_string.contains("404")
            || error_string.contains("not found");
        if (error_string.contains("401") || error_string.contains("Unauthorized"))
            && !is_not_found
        {
            WatchErrorKind::Unauthorized
        } else if error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone")
        {
            WatchErrorKind::Expired
        } else if error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests")
        {
            WatchErrorKind::TooManyRequests
        } else if is_not_found {
            WatchErrorKind::NotFound
        } else {
            WatchErrorKind::Other
        }
    }
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match WatchErrorKind::classify(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            error!("Verify the ClusterRole and ClusterRoleBinding 'pages-release-controller' still exist");
            error!(
                "  kubectl auth can-i watch pagesprojects.pages.octopilot.io --as=system:serviceaccount:<namespace>:pages-release-controller --all-namespaces"
            );
            warn!(
                "Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                watch_restart_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
        WatchErrorKind::Expired => {
            warn!(
                "Watch resource version expired (410) - this is normal during pod restarts, watch will restart"
            );
            None
        }
        WatchErrorKind::TooManyRequests => {
            let current_backoff = backoff.load(Ordering::Relaxed);
            warn!(
                "API server storage reinitializing (429), backing off for {}ms before restart...",
                current_backoff
            );
            tokio::time::sleep(Duration::from_millis(current_backoff)).await;
            let new_backoff = current_backoff.saturating_mul(2).min(max_backoff_ms);
            backoff.store(new_backoff, Ordering::Relaxed);
            None
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404) - normal after a deletion, or the CRDs are not installed. Error: {}",
                error_string
            );
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::crd::PagesProjectSpec;
    use crate::events::RecordingEvents;
    use crate::store::MemoryStore;

    fn reconciler() -> Arc<Reconciler> {
        Arc::new(Reconciler::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingEvents::new()),
            ControllerConfig::default(),
        ))
    }

    fn project() -> Arc<PagesProject> {
        let mut project = PagesProject::new("docs", PagesProjectSpec::default());
        project.metadata.namespace = Some("web".to_string());
        Arc::new(project)
    }

    #[test]
    fn test_backoff_grows_per_resource() {
        let ctx = reconciler();
        let err = ReconcilerError::BackendUnavailable("timeout".to_string());

        assert_eq!(
            handle_reconciliation_error(project(), &err, Arc::clone(&ctx)),
            Action::requeue(Duration::from_secs(60))
        );
        assert_eq!(
            handle_reconciliation_error(project(), &err, Arc::clone(&ctx)),
            Action::requeue(Duration::from_secs(60))
        );
        assert_eq!(
            handle_reconciliation_error(project(), &err, Arc::clone(&ctx)),
            Action::requeue(Duration::from_secs(120))
        );

        ctx.reset_backoff("web/docs");
        assert_eq!(
            handle_reconciliation_error(project(), &err, ctx),
            Action::requeue(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_classify_watch_errors() {
        assert_eq!(
            WatchErrorKind::classify("ApiError: Unauthorized (401)"),
            WatchErrorKind::Unauthorized
        );
        assert_eq!(
            WatchErrorKind::classify("WatchFailed: invalid type: integer `404`"),
            WatchErrorKind::NotFound
        );
        assert_eq!(
            WatchErrorKind::classify("too old resource version: 123 (456)"),
            WatchErrorKind::Expired
        );
        assert_eq!(
            WatchErrorKind::classify("storage is (re)initializing"),
            WatchErrorKind::TooManyRequests
        );
        assert_eq!(
            WatchErrorKind::classify("connection reset"),
            WatchErrorKind::Other
        );
    }

    #[tokio::test]
    async fn test_too_many_requests_doubles_backoff_up_to_max() {
        let backoff = Arc::new(AtomicU64::new(1));
        assert!(handle_watch_stream_error("429 TooManyRequests", &backoff, 3, 0)
            .await
            .is_none());
        assert_eq!(backoff.load(Ordering::Relaxed), 2);
        assert!(handle_watch_stream_error("429 TooManyRequests", &backoff, 3, 0)
            .await
            .is_none());
        assert_eq!(backoff.load(Ordering::Relaxed), 3);
    }
}
