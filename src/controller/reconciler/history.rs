//! # Validation History
//!
//! Fixed-capacity record of promotion gate outcomes, newest first.
//! Pushing onto a full buffer evicts the oldest entry.

use crate::constants::MAX_VALIDATION_HISTORY;
use crate::crd::{PagesProject, PolicyKind, ValidationOutcome, ValidationRecord};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationHistory {
    records: VecDeque<ValidationRecord>,
    capacity: usize,
}

impl Default for ValidationHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_VALIDATION_HISTORY)
    }
}

impl ValidationHistory {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Load the history persisted in the project's status
    /// Oversized histories written by older controllers are truncated
    #[must_use]
    pub fn from_status(project: &PagesProject) -> Self {
        let mut history = Self::default();
        if let Some(status) = &project.status {
            history.records.extend(
                status
                    .validation_history
                    .iter()
                    .take(history.capacity)
                    .cloned(),
            );
        }
        history
    }

    /// Record an outcome
    ///
    /// A `Failed` entry identical in version, id and outcome to the newest entry
    /// for that version is not repeated, so a gate that stays closed does not
    /// flood the buffer. Returns whether the record was added.
    pub fn record(
        &mut self,
        version: &str,
        deployment_id: &str,
        policy: PolicyKind,
        outcome: ValidationOutcome,
    ) -> bool {
        if outcome == ValidationOutcome::Failed {
            let newest_for_version = self.records.iter().find(|r| r.version == version);
            if newest_for_version.is_some_and(|r| {
                r.deployment_id == deployment_id && r.result == ValidationOutcome::Failed
            }) {
                return false;
            }
        }
        if self.records.len() == self.capacity {
            self.records.pop_back();
        }
        self.records.push_front(ValidationRecord {
            version: version.to_string(),
            deployment_id: deployment_id.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            validated_by: policy.as_str().to_string(),
            result: outcome,
        });
        true
    }

    /// Whether a passed record exists for this exact version and backend id
    #[must_use]
    pub fn contains_passed(&self, version: &str, deployment_id: &str) -> bool {
        self.records.iter().any(|r| {
            r.version == version
                && r.deployment_id == deployment_id
                && r.result == ValidationOutcome::Passed
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<ValidationRecord> {
        self.records.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first_and_bounded() {
        let mut history = ValidationHistory::with_capacity(3);
        for i in 0..5 {
            history.record(
                &format!("v{i}"),
                &format!("id-{i}"),
                PolicyKind::GitOps,
                ValidationOutcome::Passed,
            );
        }
        let versions: Vec<_> = history.iter().map(|r| r.version.clone()).collect();
        assert_eq!(versions, vec!["v4", "v3", "v2"]);
    }

    #[test]
    fn test_default_capacity_is_fifty() {
        let mut history = ValidationHistory::default();
        for i in 0..60 {
            history.record("v1", &format!("id-{i}"), PolicyKind::External, ValidationOutcome::Passed);
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.iter().next().map(|r| r.deployment_id.as_str()), Some("id-59"));
    }

    #[test]
    fn test_repeated_failures_are_deduplicated() {
        let mut history = ValidationHistory::default();
        assert!(history.record("v2", "id-2", PolicyKind::GitOps, ValidationOutcome::Failed));
        assert!(!history.record("v2", "id-2", PolicyKind::GitOps, ValidationOutcome::Failed));
        assert!(history.record("v2", "id-3", PolicyKind::GitOps, ValidationOutcome::Failed));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_contains_passed_matches_version_and_id() {
        let mut history = ValidationHistory::default();
        history.record("v2", "id-2", PolicyKind::GitOps, ValidationOutcome::Passed);
        history.record("v3", "id-3", PolicyKind::GitOps, ValidationOutcome::Failed);
        assert!(history.contains_passed("v2", "id-2"));
        assert!(!history.contains_passed("v2", "id-9"));
        assert!(!history.contains_passed("v3", "id-3"));
        assert_eq!(history.clone().into_vec().len(), 2);
    }
}
