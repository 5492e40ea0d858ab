//! # Events
//!
//! Audit trail published against projects and deployments.
//!
//! Events are advisory: the reconciler never reads them back, and a failure to
//! publish is logged and swallowed.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Reason attached to a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventReason {
    Created,
    Recreated,
    ProductionPromoted,
    ProductionDemoted,
    AutoPromoted,
    VersionReconcileFailed,
    ValidationFailed,
    Pruned,
    PruneFailed,
    CleanupFailed,
}

impl EventReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventReason::Created => "Created",
            EventReason::Recreated => "Recreated",
            EventReason::ProductionPromoted => "ProductionPromoted",
            EventReason::ProductionDemoted => "ProductionDemoted",
            EventReason::AutoPromoted => "AutoPromoted",
            EventReason::VersionReconcileFailed => "VersionReconcileFailed",
            EventReason::ValidationFailed => "ValidationFailed",
            EventReason::Pruned => "Pruned",
            EventReason::PruneFailed => "PruneFailed",
            EventReason::CleanupFailed => "CleanupFailed",
        }
    }

    /// Failures are published as `Warning`, everything else as `Normal`
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            EventReason::VersionReconcileFailed
                | EventReason::ValidationFailed
                | EventReason::PruneFailed
                | EventReason::CleanupFailed
        )
    }

    /// Controller action that produced the event
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            EventReason::Created | EventReason::Recreated => "Materialize",
            EventReason::ProductionPromoted
            | EventReason::ProductionDemoted
            | EventReason::AutoPromoted
            | EventReason::ValidationFailed => "Promote",
            EventReason::Pruned | EventReason::PruneFailed => "Prune",
            EventReason::CleanupFailed => "Finalize",
            EventReason::VersionReconcileFailed => "Reconcile",
        }
    }
}

impl fmt::Display for EventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event sink seam
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish an event regarding `object`; never fails
    async fn publish(&self, object: &ObjectReference, reason: EventReason, note: String);
}

/// Publishes `events.k8s.io/v1` events through the kube runtime recorder
#[derive(Clone)]
pub struct KubeEventSink {
    recorder: Recorder,
}

impl fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

impl KubeEventSink {
    #[must_use]
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(&self, object: &ObjectReference, reason: EventReason, note: String) {
        let event = Event {
            type_: if reason.is_warning() {
                EventType::Warning
            } else {
                EventType::Normal
            },
            reason: reason.as_str().to_string(),
            note: Some(note),
            action: reason.action().to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, object).await {
            warn!(
                "Failed to publish {} event for {}/{}: {}",
                reason,
                object.namespace.as_deref().unwrap_or_default(),
                object.name.as_deref().unwrap_or_default(),
                e
            );
        }
    }
}

/// An event captured by [`RecordingEvents`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub kind: String,
    pub name: String,
    pub reason: EventReason,
    pub note: String,
}

/// In-memory sink capturing every published event, used by tests
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events with the given reason
    #[must_use]
    pub fn with_reason(&self, reason: EventReason) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.reason == reason)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl EventSink for RecordingEvents {
    async fn publish(&self, object: &ObjectReference, reason: EventReason, note: String) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                kind: object.kind.clone().unwrap_or_default(),
                name: object.name.clone().unwrap_or_default(),
                reason,
                note,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reasons_are_warnings() {
        assert!(EventReason::VersionReconcileFailed.is_warning());
        assert!(EventReason::PruneFailed.is_warning());
        assert!(!EventReason::ProductionPromoted.is_warning());
        assert!(!EventReason::Created.is_warning());
    }

    #[tokio::test]
    async fn test_recording_sink_filters_by_reason() {
        let sink = RecordingEvents::new();
        let object = ObjectReference {
            kind: Some("PagesProject".to_string()),
            name: Some("docs".to_string()),
            ..Default::default()
        };
        sink.publish(&object, EventReason::Created, "created v1".to_string())
            .await;
        sink.publish(&object, EventReason::Pruned, "pruned v0".to_string())
            .await;

        let created = sink.with_reason(EventReason::Created);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "docs");
        assert_eq!(sink.events().len(), 2);
    }
}
