use crate::domain::entities::ChangeEvent;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// e.g. changes to `pickup_requests` where `client_id = 42`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFilter {
    pub entity_type: String,
    pub column: Option<String>,
    pub equals: Option<String>,
}

impl ChangeFilter {
    pub fn entity(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            column: None,
            equals: None,
        }
    }

    pub fn owned_by(
        entity_type: impl Into<String>,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            column: Some(column.into()),
            equals: Some(value.into()),
        }
    }
}

/// Server-push channel. Events arrive in order, but gaps may occur across reconnects.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<mpsc::Receiver<ChangeEvent>, AppError>;
}
