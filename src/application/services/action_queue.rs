use crate::application::ports::key_value_store::KeyValueStore;
use crate::domain::entities::{ActionTarget, OfflineAction};
use crate::domain::value_objects::{ActionId, ActionPayload, ActionType};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// 永続化されたアクションキュー（FIFO）
///
/// Every mutation builds the next queue, writes it to the store and only then
/// replaces the in-memory copy, so `list_all` never shows anything that is not
/// durable. The mutex is held across the store write to keep mutations serial.
pub struct ActionQueue {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    clock: Arc<dyn Clock>,
    actions: Mutex<Vec<OfflineAction>>,
}

impl ActionQueue {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        storage_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
            clock,
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Replaces the in-memory queue with whatever the store holds.
    pub async fn load_from_store(&self) -> Result<usize, AppError> {
        let mut guard = self.actions.lock().await;
        let loaded = match self.store.get(&self.storage_key).await? {
            Some(bytes) => serde_json::from_slice::<Vec<OfflineAction>>(&bytes).map_err(|err| {
                AppError::DeserializationError(format!(
                    "action queue '{}' is unreadable: {err}",
                    self.storage_key
                ))
            })?,
            None => Vec::new(),
        };

        let count = loaded.len();
        *guard = loaded;
        tracing::debug!(
            target: "offline::queue",
            key = %self.storage_key,
            count,
            "action queue loaded"
        );
        Ok(count)
    }

    pub async fn flush_to_store(&self) -> Result<(), AppError> {
        let guard = self.actions.lock().await;
        self.write(&guard).await
    }

    pub async fn enqueue(
        &self,
        action_type: ActionType,
        payload: ActionPayload,
        target: Option<ActionTarget>,
    ) -> Result<OfflineAction, AppError> {
        let action = OfflineAction::new(action_type, payload, target, self.clock.now());

        let mut guard = self.actions.lock().await;
        let mut next = guard.clone();
        next.push(action.clone());
        self.commit(&mut guard, next).await?;

        tracing::info!(
            target: "offline::queue",
            action_id = %action.id,
            action_type = %action.action_type,
            queued = guard.len(),
            "action queued"
        );
        Ok(action)
    }

    /// Appends an existing action at the tail, keeping its id.
    pub async fn requeue(&self, action: OfflineAction) -> Result<(), AppError> {
        let mut guard = self.actions.lock().await;
        if guard.iter().any(|queued| queued.id == action.id) {
            return Err(AppError::InvalidInput(format!(
                "action {} is already queued",
                action.id
            )));
        }
        let mut next = guard.clone();
        next.push(action);
        self.commit(&mut guard, next).await
    }

    /// Removes the action with `id`; `None` if it was not queued.
    pub async fn dequeue_by_id(&self, id: &ActionId) -> Result<Option<OfflineAction>, AppError> {
        let mut guard = self.actions.lock().await;
        let Some(index) = guard.iter().position(|action| &action.id == id) else {
            return Ok(None);
        };

        let mut next = guard.clone();
        let removed = next.remove(index);
        self.commit(&mut guard, next).await?;
        Ok(Some(removed))
    }

    /// Bumps attempts and records the error in place; the action keeps its position.
    pub async fn record_failure(
        &self,
        id: &ActionId,
        error: &str,
    ) -> Result<Option<OfflineAction>, AppError> {
        let now = self.clock.now();
        let mut guard = self.actions.lock().await;
        let Some(index) = guard.iter().position(|action| &action.id == id) else {
            return Ok(None);
        };

        let mut next = guard.clone();
        next[index].record_failure(error, now);
        let updated = next[index].clone();
        self.commit(&mut guard, next).await?;
        Ok(Some(updated))
    }

    pub async fn list_all(&self) -> Vec<OfflineAction> {
        self.actions.lock().await.clone()
    }

    pub async fn get(&self, id: &ActionId) -> Option<OfflineAction> {
        self.actions
            .lock()
            .await
            .iter()
            .find(|action| &action.id == id)
            .cloned()
    }

    /// 指定コレクションを対象とする未処理アクション（FIFO 順）
    pub async fn pending_for_collection(&self, collection: &str) -> Vec<OfflineAction> {
        self.actions
            .lock()
            .await
            .iter()
            .filter(|action| action.targets_collection(collection))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.actions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.actions.lock().await.is_empty()
    }

    /// Drops every queued action, e.g. on logout.
    pub async fn clear(&self) -> Result<usize, AppError> {
        let mut guard = self.actions.lock().await;
        let count = guard.len();
        self.store.remove(&self.storage_key).await?;
        guard.clear();
        Ok(count)
    }

    async fn commit(
        &self,
        guard: &mut MutexGuard<'_, Vec<OfflineAction>>,
        next: Vec<OfflineAction>,
    ) -> Result<(), AppError> {
        self.write(&next).await?;
        **guard = next;
        Ok(())
    }

    async fn write(&self, actions: &[OfflineAction]) -> Result<(), AppError> {
        let encoded = serde_json::to_vec(actions)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        self.store
            .set(&self.storage_key, Bytes::from(encoded))
            .await
            .map_err(|err| {
                tracing::warn!(
                    target: "offline::queue",
                    key = %self.storage_key,
                    error = %err,
                    "failed to persist action queue"
                );
                err
            })
    }
}
