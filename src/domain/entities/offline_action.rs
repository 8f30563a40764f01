use crate::domain::value_objects::{ActionId, ActionPayload, ActionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a pending action is expected to change its target record once it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetEffect {
    Upsert,
    Remove,
}

/// The observed collection and logical record an action touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTarget {
    pub collection: String,
    pub entity_id: String,
    pub effect: TargetEffect,
}

impl ActionTarget {
    pub fn upsert(collection: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entity_id: entity_id.into(),
            effect: TargetEffect::Upsert,
        }
    }

    pub fn remove(collection: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entity_id: entity_id.into(),
            effect: TargetEffect::Remove,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
}

impl ActionMetadata {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            attempts: 0,
            last_error: None,
            last_attempt: None,
        }
    }
}

/// 未確定のミューテーション要求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineAction {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub payload: ActionPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ActionTarget>,
    pub metadata: ActionMetadata,
}

impl OfflineAction {
    pub fn new(
        action_type: ActionType,
        payload: ActionPayload,
        target: Option<ActionTarget>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActionId::generate(created_at),
            action_type,
            payload,
            target,
            metadata: ActionMetadata::new(created_at),
        }
    }

    /// Records a failed execution and returns the new attempt count.
    pub fn record_failure(&mut self, error: impl Into<String>, at: DateTime<Utc>) -> u32 {
        self.metadata.attempts = self.metadata.attempts.saturating_add(1);
        self.metadata.last_error = Some(error.into());
        self.metadata.last_attempt = Some(at);
        self.metadata.attempts
    }

    pub fn reset_attempts(&mut self) {
        self.metadata.attempts = 0;
        self.metadata.last_error = None;
        self.metadata.last_attempt = None;
    }

    pub fn targets_collection(&self, collection: &str) -> bool {
        self.target
            .as_ref()
            .map(|target| target.collection == collection)
            .unwrap_or(false)
    }
}
