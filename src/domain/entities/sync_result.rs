use super::dead_letter::DeadLetter;
use crate::domain::value_objects::ActionId;
use serde::{Deserialize, Serialize};

/// Totals for one drain pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub synced_count: u32,
    pub failed_count: u32,
    pub dropped_count: u32,
    pub remaining_count: u32,
    pub storage_error: Option<String>,
}

impl DrainReport {
    pub fn is_clean(&self) -> bool {
        self.failed_count == 0 && self.dropped_count == 0 && self.storage_error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    AlreadyRunning,
    Offline,
}

impl DrainOutcome {
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            DrainOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// 手動同期の結果（UI へそのまま返す）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManualSyncResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<DrainReport>,
}

impl ManualSyncResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            report: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    DrainStarted { queued: usize },
    ActionSynced { id: ActionId },
    ActionFailed { id: ActionId, attempts: u32, error: String },
    ActionDropped(Box<DeadLetter>),
    DrainFinished(DrainReport),
}
