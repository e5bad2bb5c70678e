//! # Status Conditions
//!
//! Crossplane-style `Ready` and `Synced` conditions.
//!
//! `Ready` tracks the external resource lifecycle (`Creating`, `Available`,
//! `Deleting`); `Synced` reports whether the last reconciliation pass
//! succeeded (`ReconcileSuccess` / `ReconcileError`).

use chrono::Utc;

use crate::crd::Condition;

pub const TYPE_READY: &str = "Ready";
pub const TYPE_SYNCED: &str = "Synced";

pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_CREATING: &str = "Creating";
pub const REASON_DELETING: &str = "Deleting";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";

fn condition(type_: &str, status: bool, reason: &str, message: Option<String>) -> Condition {
    Condition {
        r#type: type_.to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        last_transition_time: Some(Utc::now().to_rfc3339()),
        reason: Some(reason.to_string()),
        message,
    }
}

#[must_use]
pub fn available() -> Condition {
    condition(TYPE_READY, true, REASON_AVAILABLE, None)
}

#[must_use]
pub fn creating() -> Condition {
    condition(TYPE_READY, false, REASON_CREATING, None)
}

#[must_use]
pub fn deleting() -> Condition {
    condition(TYPE_READY, false, REASON_DELETING, None)
}

#[must_use]
pub fn reconcile_success() -> Condition {
    condition(TYPE_SYNCED, true, REASON_RECONCILE_SUCCESS, None)
}

#[must_use]
pub fn reconcile_error(message: impl Into<String>) -> Condition {
    condition(TYPE_SYNCED, false, REASON_RECONCILE_ERROR, Some(message.into()))
}

/// Insert or replace the condition of the same type
///
/// The previous transition time is kept when status and reason are unchanged,
/// so repeated passes do not churn the resource.
pub fn set_condition(conditions: &mut Vec<Condition>, mut new: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == new.r#type) {
        Some(existing) => {
            if existing.status == new.status && existing.reason == new.reason {
                new.last_transition_time = existing.last_transition_time.take();
            }
            *existing = new;
        }
        None => conditions.push(new),
    }
}

/// Find a condition by type
#[must_use]
pub fn get_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == type_)
}
