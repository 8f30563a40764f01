use crate::application::ports::key_value_store::KeyValueStore;
use crate::application::services::action_queue::ActionQueue;
use crate::domain::entities::{DeadLetter, DropReason, OfflineAction};
use crate::domain::value_objects::ActionId;
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 同期を諦めたアクションの保管庫
///
/// Actions the orchestrator gives up on land here instead of vanishing. The UI
/// can list them, put one back on the queue, or discard it.
pub struct DeadLetterBox {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    clock: Arc<dyn Clock>,
    letters: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterBox {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        storage_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
            clock,
            letters: Mutex::new(Vec::new()),
        }
    }

    pub async fn load_from_store(&self) -> Result<usize, AppError> {
        let mut guard = self.letters.lock().await;
        let loaded = match self.store.get(&self.storage_key).await? {
            Some(bytes) => serde_json::from_slice::<Vec<DeadLetter>>(&bytes).map_err(|err| {
                AppError::DeserializationError(format!("dead letters are unreadable: {err}"))
            })?,
            None => Vec::new(),
        };
        let count = loaded.len();
        *guard = loaded;
        Ok(count)
    }

    pub async fn push(
        &self,
        action: OfflineAction,
        reason: DropReason,
        error: Option<String>,
    ) -> Result<DeadLetter, AppError> {
        let letter = DeadLetter::new(action, reason, error, self.clock.now());

        let mut guard = self.letters.lock().await;
        let mut next = guard.clone();
        next.push(letter.clone());
        self.write(&next).await?;
        *guard = next;
        Ok(letter)
    }

    pub async fn list(&self) -> Vec<DeadLetter> {
        self.letters.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.letters.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.letters.lock().await.is_empty()
    }

    /// Removes a dead letter without retrying it.
    pub async fn discard(&self, id: &ActionId) -> Result<Option<DeadLetter>, AppError> {
        let mut guard = self.letters.lock().await;
        let Some(index) = guard.iter().position(|letter| &letter.action.id == id) else {
            return Ok(None);
        };
        let mut next = guard.clone();
        let removed = next.remove(index);
        self.write(&next).await?;
        *guard = next;
        Ok(Some(removed))
    }

    /// Moves a dead letter back to the tail of `queue` with a fresh attempt budget.
    ///
    /// The letter is only removed once the queue has durably accepted the action.
    pub async fn requeue(
        &self,
        id: &ActionId,
        queue: &ActionQueue,
    ) -> Result<OfflineAction, AppError> {
        let mut guard = self.letters.lock().await;
        let index = guard
            .iter()
            .position(|letter| &letter.action.id == id)
            .ok_or_else(|| AppError::NotFound(format!("dead letter {id}")))?;

        let mut action = guard[index].action.clone();
        action.reset_attempts();
        queue.requeue(action.clone()).await?;

        let mut next = guard.clone();
        next.remove(index);
        self.write(&next).await?;
        *guard = next;

        tracing::info!(
            target: "offline::dead_letter",
            action_id = %action.id,
            "dead letter moved back to the action queue"
        );
        Ok(action)
    }

    pub async fn clear(&self) -> Result<usize, AppError> {
        let mut guard = self.letters.lock().await;
        let count = guard.len();
        self.store.remove(&self.storage_key).await?;
        guard.clear();
        Ok(count)
    }

    async fn write(&self, letters: &[DeadLetter]) -> Result<(), AppError> {
        let encoded = serde_json::to_vec(letters)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        self.store.set(&self.storage_key, Bytes::from(encoded)).await
    }
}
