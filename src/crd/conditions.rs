//! Operator conditions
//!
//! The condition shape shared by the operator config, ClusterCSIDriver and
//! ClusterOperator status, plus the helpers used to set and reduce them.

use chrono::{DateTime, SubsecRound, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// A single status condition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorCondition {
    /// Type of condition, e.g. `AWSEBSCSIDriverOperatorCRAvailable`
    pub r#type: String,
    /// Status: True, False, Unknown
    pub status: ConditionStatus,
    /// Last transition time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl OperatorCondition {
    pub fn new(r#type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            r#type: r#type.into(),
            status,
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_false(&self) -> bool {
        self.status == ConditionStatus::False
    }

    /// Equal ignoring the transition time
    pub fn same_state(&self, other: &OperatorCondition) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Current time truncated to whole seconds, the resolution the API server keeps
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Find a condition by type
pub fn find_condition<'a>(
    conditions: &'a [OperatorCondition],
    condition_type: &str,
) -> Option<&'a OperatorCondition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// True when the condition exists and is True
pub fn is_condition_true(conditions: &[OperatorCondition], condition_type: &str) -> bool {
    find_condition(conditions, condition_type).is_some_and(OperatorCondition::is_true)
}

/// Set a condition, replacing an existing one of the same type.
///
/// The transition time is carried over when the status did not change.
pub fn set_condition(conditions: &mut Vec<OperatorCondition>, mut condition: OperatorCondition) {
    match conditions
        .iter_mut()
        .find(|c| c.r#type == condition.r#type)
    {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            } else if condition.last_transition_time.is_none() {
                condition.last_transition_time = Some(now());
            }
            *existing = condition;
        }
        None => {
            if condition.last_transition_time.is_none() {
                condition.last_transition_time = Some(now());
            }
            conditions.push(condition);
        }
    }
}

/// Carry transition times of `existing` over to `desired`.
///
/// Returns `None` when every desired condition is already present in the
/// same state, so callers can skip the write.
pub fn merge_transition_times(
    existing: &[OperatorCondition],
    desired: Vec<OperatorCondition>,
) -> Option<Vec<OperatorCondition>> {
    let mut changed = false;
    let conditions = desired
        .into_iter()
        .map(|mut condition| {
            match find_condition(existing, &condition.r#type) {
                Some(current) => {
                    changed |= !current.same_state(&condition);
                    condition.last_transition_time = if current.status == condition.status {
                        current.last_transition_time.or_else(|| Some(now()))
                    } else {
                        Some(now())
                    };
                }
                None => {
                    changed = true;
                    condition.last_transition_time = Some(now());
                }
            }
            condition
        })
        .collect();
    changed.then_some(conditions)
}
