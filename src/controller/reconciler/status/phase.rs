//! # Status Phase
//!
//! Phase strings and the `Ready` condition.

use crate::crd::{Condition, PagesProjectStatus};

pub const PHASE_READY: &str = "Ready";
pub const PHASE_DEGRADED: &str = "Degraded";
pub const PHASE_SUSPENDED: &str = "Suspended";

pub const CONDITION_READY: &str = "Ready";

/// Build the `Ready` condition
///
/// `lastTransitionTime` is carried over from the previous condition while the
/// status value stays the same.
#[must_use]
pub fn ready_condition(
    previous: Option<&PagesProjectStatus>,
    ready: bool,
    reason: &str,
    message: &str,
    now: &str,
) -> Condition {
    let status = if ready { "True" } else { "False" };
    let last_transition_time = previous
        .and_then(|s| s.conditions.iter().find(|c| c.r#type == CONDITION_READY))
        .filter(|c| c.status == status)
        .and_then(|c| c.last_transition_time.clone())
        .unwrap_or_else(|| now.to_string());
    Condition {
        r#type: CONDITION_READY.to_string(),
        status: status.to_string(),
        last_transition_time: Some(last_transition_time),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    }
}

/// Replace the `Ready` condition, keeping any other condition types
#[must_use]
pub fn with_ready_condition(existing: &[Condition], ready: Condition) -> Vec<Condition> {
    let mut conditions: Vec<Condition> = existing
        .iter()
        .filter(|c| c.r#type != CONDITION_READY)
        .cloned()
        .collect();
    conditions.insert(0, ready);
    conditions
}
