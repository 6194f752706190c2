//! Observed status written back after each reconciliation pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which aspect of the resource a condition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// Whether the remote object exists and is usable.
    Ready,
    /// Whether the last pass completed without error.
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionReason {
    Available,
    Creating,
    Deleting,
    ReconcileSuccess,
    ReconcileError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub status: bool,
    pub reason: ConditionReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    fn new(kind: ConditionType, status: bool, reason: ConditionReason) -> Self {
        Self {
            kind,
            status,
            reason,
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    pub fn available() -> Self {
        Self::new(ConditionType::Ready, true, ConditionReason::Available)
    }

    pub fn creating() -> Self {
        Self::new(ConditionType::Ready, false, ConditionReason::Creating)
    }

    pub fn deleting() -> Self {
        Self::new(ConditionType::Ready, false, ConditionReason::Deleting)
    }

    pub fn reconcile_success() -> Self {
        Self::new(ConditionType::Synced, true, ConditionReason::ReconcileSuccess)
    }

    pub fn reconcile_error(message: impl Into<String>) -> Self {
        let mut condition = Self::new(ConditionType::Synced, false, ConditionReason::ReconcileError);
        condition.message = Some(message.into());
        condition
    }

    /// Same type, status, reason and message; the timestamp is ignored.
    pub fn equivalent(&self, other: &Condition) -> bool {
        self.kind == other.kind
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Conditions of one managed resource, at most one per [`ConditionType`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ResourceStatus {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn condition(&self, kind: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    /// Set a condition, replacing any existing condition of the same type.
    ///
    /// An equivalent existing condition is left untouched so its
    /// transition time only moves when something actually changed.
    pub fn set_condition(&mut self, condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.kind == condition.kind) {
            Some(existing) if existing.equivalent(&condition) => {}
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.condition(ConditionType::Ready).map(|c| c.status).unwrap_or(false)
    }

    pub fn is_synced(&self) -> bool {
        self.condition(ConditionType::Synced).map(|c| c.status).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_condition_replaces_same_type() {
        let mut status = ResourceStatus::default();
        status.set_condition(Condition::creating());
        status.set_condition(Condition::reconcile_success());
        status.set_condition(Condition::available());

        assert_eq!(status.conditions.len(), 2);
        assert!(status.is_ready());
        assert!(status.is_synced());
    }

    #[test]
    fn test_equivalent_condition_keeps_transition_time() {
        let mut status = ResourceStatus::default();
        let mut first = Condition::available();
        first.last_transition_time = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        status.set_condition(first.clone());

        status.set_condition(Condition::available());
        assert_eq!(
            status.condition(ConditionType::Ready).unwrap().last_transition_time,
            first.last_transition_time
        );
    }

    #[test]
    fn test_reconcile_error_carries_message() {
        let mut status = ResourceStatus::default();
        status.set_condition(Condition::reconcile_error("cannot create role: boom"));
        let synced = status.condition(ConditionType::Synced).unwrap();
        assert!(!synced.status);
        assert_eq!(synced.message.as_deref(), Some("cannot create role: boom"));
    }
}
