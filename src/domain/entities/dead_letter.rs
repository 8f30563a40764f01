use super::offline_action::OfflineAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No executor is registered for the action type.
    UnknownActionType,
    /// The executor rejected the payload; retrying cannot succeed.
    Rejected,
    RetriesExhausted,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DropReason::UnknownActionType => "unknown_action_type",
            DropReason::Rejected => "rejected",
            DropReason::RetriesExhausted => "retries_exhausted",
        };
        f.write_str(label)
    }
}

/// キューから除外されたアクションの記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub action: OfflineAction,
    pub reason: DropReason,
    pub error: Option<String>,
    pub dropped_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        action: OfflineAction,
        reason: DropReason,
        error: Option<String>,
        dropped_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            reason,
            error,
            dropped_at,
        }
    }
}
